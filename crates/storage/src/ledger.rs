// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation ledger: durable, non-propagating recording of mutating calls.
//!
//! A mutation that happened must never masquerade as one that didn't: the
//! handler already succeeded side-effectually by the time the ledger runs,
//! so recording failure is logged and swallowed, never surfaced as a tool
//! failure.

use crate::store::{Store, StoreError};
use fm_core::{MutationId, MutationRecord};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Only the first 10k bytes of a serialized result feed the hash.
pub const RESULT_HASH_MAX_BYTES: usize = 10_000;

const RECORD_ATTEMPTS: u32 = 3;
const BACKOFF_STEP_MS: u64 = 100;

/// Hex SHA-256 over the first [`RESULT_HASH_MAX_BYTES`] of the payload.
///
/// Enables deterministic-replay cross-checks and duplicate detection at the
/// audit layer.
pub fn result_hash(payload: &str) -> String {
    let bytes = payload.as_bytes();
    let end = bytes.len().min(RESULT_HASH_MAX_BYTES);
    let mut hasher = Sha256::new();
    hasher.update(&bytes[..end]);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Result of a ledger write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub ok: bool,
    pub mutation_id: Option<MutationId>,
}

/// Append-only recorder for mutating tool calls.
pub struct MutationLedger {
    store: Arc<dyn Store>,
}

impl MutationLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a mutation, retrying transient store failures with linear
    /// backoff. Never returns an error: exhaustion is logged as
    /// `ledger_failure` and reported through the outcome flag only.
    pub async fn record(&self, record: MutationRecord) -> RecordOutcome {
        let mut attempt = 1u32;
        loop {
            match self.store.record_mutation(&record).await {
                Ok(id) => return RecordOutcome { ok: true, mutation_id: Some(id) },
                Err(e) if e.is_transient() && attempt < RECORD_ATTEMPTS => {
                    tracing::warn!(
                        tool = %record.tool_name,
                        wo = %record.work_order_id,
                        attempt,
                        error = %e,
                        "ledger write retry"
                    );
                    tokio::time::sleep(Duration::from_millis(BACKOFF_STEP_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                Err(e) => {
                    self.log_failure(&record, attempt, &e);
                    return RecordOutcome { ok: false, mutation_id: None };
                }
            }
        }
    }

    fn log_failure(&self, record: &MutationRecord, attempts: u32, error: &StoreError) {
        tracing::error!(
            tool = %record.tool_name,
            wo = %record.work_order_id,
            object_id = %record.object_id,
            attempts,
            error = %error,
            "ledger_failure: mutation record dropped"
        );
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
