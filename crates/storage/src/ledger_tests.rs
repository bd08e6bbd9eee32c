// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryStore;
use fm_core::{MutationRecord, WorkOrderId};

fn record() -> MutationRecord {
    MutationRecord::success(
        WorkOrderId::from_string("wko-1"),
        "github_push_files",
        "repository",
        "README.md",
        "PUSH",
        "builder",
        1_000,
    )
}

#[tokio::test]
async fn record_returns_mutation_id_on_success() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let ledger = MutationLedger::new(store.clone());

    let outcome = ledger.record(record()).await;
    assert!(outcome.ok);
    assert!(outcome.mutation_id.is_some());
    assert_eq!(store.mutation_rows().len(), 1);
}

#[tokio::test]
async fn record_retries_transient_failures() {
    let store = std::sync::Arc::new(MemoryStore::new());
    store.fail_next_mutations(2);
    let ledger = MutationLedger::new(store.clone());

    let outcome = ledger.record(record()).await;
    assert!(outcome.ok, "third attempt should succeed");
    assert_eq!(store.mutation_rows().len(), 1);
}

#[tokio::test]
async fn record_gives_up_after_three_attempts() {
    let store = std::sync::Arc::new(MemoryStore::new());
    store.fail_next_mutations(3);
    let ledger = MutationLedger::new(store.clone());

    let outcome = ledger.record(record()).await;
    assert!(!outcome.ok, "exhausted retries must not report success");
    assert!(outcome.mutation_id.is_none());
    assert!(store.mutation_rows().is_empty());
}

#[test]
fn result_hash_is_stable_hex() {
    let a = result_hash("hello");
    let b = result_hash("hello");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn result_hash_caps_at_first_10k_bytes() {
    let base = "x".repeat(RESULT_HASH_MAX_BYTES);
    let longer = format!("{base}tail-ignored");
    assert_eq!(result_hash(&base), result_hash(&longer));
}

#[test]
fn result_hash_differs_for_different_payloads() {
    assert_ne!(result_hash("a"), result_hash("b"));
}
