// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Team context: knowledge rows shared across a delegated-WO tree.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::define_id! {
    /// Identifier for a team-context row.
    pub struct ContextId("ctx");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Plan,
    Finding,
    Decision,
    FileList,
    SchemaChange,
}

crate::display_labels! {
    ContextType {
        Plan => "plan",
        Finding => "finding",
        Decision => "decision",
        FileList => "file_list",
        SchemaChange => "schema_change",
    }
}

/// A context entry scoped to the root of a WO tree and visible to every
/// descendant. `root_wo_id` is resolved by walking `parent_id` at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamContext {
    pub id: ContextId,
    pub root_wo_id: WorkOrderId,
    pub author_actor: String,
    pub context_type: ContextType,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: u64,
}
