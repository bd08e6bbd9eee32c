// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the ledger, log payloads, and the Ops loop.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};

/// Classification tag attached to ledger rows and error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Missing/malformed parameters, validation failures.
    InvalidInput,
    /// Static permission matrix, read-only guard, destructive-DDL guard,
    /// bypass-embedded-in-SQL guard.
    PermissionDenied,
    /// State machine rejects the event for the current status.
    InvalidTransition,
    /// Transition RPC reported success but re-read shows a stale status.
    StatusMismatch,
    /// DDL advisory lock timed out.
    LockContention,
    /// HTTP non-2xx from git/sandbox/deploy endpoints.
    ExternalFailure,
    /// Abort/timeout on outbound I/O.
    NetworkTimeout,
    /// record_mutation exhausted retries (stderr-only, not propagated).
    LedgerFailure,
    /// Ops loop refuses further action on a WO.
    CircuitOpen,
}

crate::display_labels! {
    ErrorClass {
        InvalidInput => "invalid_input",
        PermissionDenied => "permission_denied",
        InvalidTransition => "invalid_transition",
        StatusMismatch => "status_mismatch",
        LockContention => "lock_contention",
        ExternalFailure => "external_failure",
        NetworkTimeout => "network_timeout",
        LedgerFailure => "ledger_failure",
        CircuitOpen => "circuit_open",
    }
}

/// A diagnostic row written on integrity violations and handler faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_order_id: Option<WorkOrderId>,
    pub detail: String,
    pub created_at: u64,
}

/// Aggregated error count surfaced by the Ops loop spike probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSpike {
    pub code: String,
    pub source: String,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorClass::StatusMismatch).unwrap();
        assert_eq!(json, "\"status_mismatch\"");
        assert_eq!(ErrorClass::StatusMismatch.label(), "status_mismatch");
    }
}
