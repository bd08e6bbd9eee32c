// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation-ledger rows: the append-only record of mutating tool calls.

use crate::error::ErrorClass;
use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::define_id! {
    /// Identifier assigned to a ledger row on insert.
    pub struct MutationId("mut");
}

/// Who recorded the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// The in-process handler ran and recorded its own result.
    SelfReport,
    /// A verifying proxy executed the call and records server-side; the
    /// in-process recorder is suppressed.
    EdgeProxy,
}

crate::display_labels! {
    ProxyMode {
        SelfReport => "self_report",
        EdgeProxy => "edge_proxy",
    }
}

/// One row per dispatched mutating tool call. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub work_order_id: WorkOrderId,
    pub tool_name: String,
    pub object_type: String,
    pub object_id: String,
    /// Tool-specific verb: SELECT, INSERT, DDL, PUSH, DEPLOY, EXEC, TEST, …
    pub action: String,
    pub success: bool,
    /// Set by the post-hoc verifier, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Hex SHA-256 of the serialized result (first 10k bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_hash: Option<String>,
    pub proxy_mode: ProxyMode,
    pub actor: String,
    pub created_at: u64,
}

impl MutationRecord {
    /// A successful self-reported row with empty context.
    pub fn success(
        work_order_id: WorkOrderId,
        tool_name: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            work_order_id,
            tool_name: tool_name.into(),
            object_type: object_type.into(),
            object_id: object_id.into(),
            action: action.into(),
            success: true,
            verified: None,
            error_class: None,
            error_detail: None,
            context: Map::new(),
            result_hash: None,
            proxy_mode: ProxyMode::SelfReport,
            actor: actor.into(),
            created_at,
        }
    }

    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn failed(mut self, class: ErrorClass, detail: impl Into<String>) -> Self {
        self.success = false;
        self.error_class = Some(class);
        self.error_detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_mode_serde() {
        assert_eq!(serde_json::to_string(&ProxyMode::EdgeProxy).unwrap(), "\"edge_proxy\"");
    }

    #[test]
    fn failed_sets_class_and_detail() {
        let rec = MutationRecord::success(
            WorkOrderId::from_string("wko-1"),
            "execute_sql",
            "database",
            "INSERT",
            "DML",
            "builder",
            1,
        )
        .failed(ErrorClass::InvalidInput, "bad query");
        assert!(!rec.success);
        assert_eq!(rec.error_class, Some(ErrorClass::InvalidInput));
        assert_eq!(rec.error_detail.as_deref(), Some("bad query"));
    }
}
