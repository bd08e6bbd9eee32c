// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-log entries: the chronological narrative of a work order.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Narrative phase of an execution-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Spec,
    Plan,
    Build,
    Stream,
    Failed,
    ExecutionComplete,
    DeploymentVerification,
    Checkpoint,
    Continuation,
}

crate::display_labels! {
    Phase {
        Spec => "spec",
        Plan => "plan",
        Build => "build",
        Stream => "stream",
        Failed => "failed",
        ExecutionComplete => "execution_complete",
        DeploymentVerification => "deployment_verification",
        Checkpoint => "checkpoint",
        Continuation => "continuation",
    }
}

/// One chronological narrative row. Read by humans and by the Ops loop to
/// detect activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub work_order_id: WorkOrderId,
    pub phase: Phase,
    pub actor: String,
    /// Mapping with `event_type` and a tool-specific payload.
    #[serde(default)]
    pub detail: Map<String, Value>,
    pub created_at: u64,
}

impl ExecutionLogEntry {
    /// Build an entry whose detail carries an `event_type` marker.
    pub fn event(
        work_order_id: WorkOrderId,
        phase: Phase,
        actor: impl Into<String>,
        event_type: &str,
        created_at: u64,
    ) -> Self {
        let mut detail = Map::new();
        detail.insert("event_type".into(), Value::String(event_type.into()));
        Self { work_order_id, phase, actor: actor.into(), detail, created_at }
    }

    /// Attach an extra detail field.
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.into(), value);
        self
    }

    /// The `event_type` marker, if any.
    pub fn event_type(&self) -> Option<&str> {
        self.detail.get("event_type").and_then(Value::as_str)
    }
}
