// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-order entity and tag/client-info helpers.

use crate::qa::{QaItem, QaStatus};
use crate::status::WoStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a work order.
    ///
    /// Each WO gets a unique ID used to track its state, reference it in
    /// ledger rows and logs, and build parent/child trees.
    pub struct WorkOrderId("wko");
}

/// Tags whose presence makes a WO "deployment-tagged": completion requires
/// a deployment_verification log entry.
pub const DEPLOYMENT_TAGS: [&str; 5] = ["edge-function", "deploy", "deployment", "schema", "migration"];

/// Tokens the runtime attaches for its own bookkeeping. Excluded from
/// concurrent-overlap comparisons and from child-WO inheritance where noted.
pub const OPERATIONAL_TAGS: [&str; 9] = [
    "remediation",
    "auto-qa-loop",
    "ops-diagnostic",
    "local-filesystem",
    "edge-function",
    "deploy",
    "deployment",
    "schema",
    "migration",
];

/// Work-order priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P0Critical,
    P1High,
    P2Medium,
    P3Low,
}

crate::display_labels! {
    Priority {
        P0Critical => "p0_critical",
        P1High => "p1_high",
        P2Medium => "p2_medium",
        P3Low => "p3_low",
    }
}

impl Priority {
    /// Low-priority WOs are auto-approved at creation; high-priority ones
    /// enter pending_approval for a human gate.
    pub fn auto_approves(&self) -> bool {
        matches!(self, Priority::P2Medium | Priority::P3Low)
    }
}

/// A work order: the atomic unit of scheduled, auditable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub slug: String,
    pub name: String,
    pub objective: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub status: WoStatus,
    pub assigned_actor: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<WorkOrderId>,
    #[serde(default)]
    pub qa_checklist: Vec<QaItem>,
    /// Retry counters and operational bookkeeping (including the assigned
    /// model). Free-form mapping; keys are runtime-owned.
    #[serde(default)]
    pub client_info: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl WorkOrder {
    /// Whether the WO has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether any tag requires deployment verification before completion.
    pub fn has_deployment_tag(&self) -> bool {
        self.tags.iter().any(|t| DEPLOYMENT_TAGS.contains(&t.as_str()))
    }

    /// The `parent:<slug>` token, if present.
    pub fn parent_tag(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| t.strip_prefix("parent:"))
    }

    /// Tags a delegated child inherits: everything except `remediation`,
    /// `auto-qa-loop`, and any `parent:*` token.
    pub fn inheritable_tags(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .filter(|t| {
                t.as_str() != "remediation"
                    && t.as_str() != "auto-qa-loop"
                    && !t.starts_with("parent:")
            })
            .cloned()
            .collect()
    }

    /// Tags considered for concurrent-overlap warnings: operational tokens
    /// and `parent:*` markers are ignored.
    pub fn overlap_tags(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .filter(|t| !OPERATIONAL_TAGS.contains(&t.as_str()) && !t.starts_with("parent:"))
            .cloned()
            .collect()
    }

    /// Number of checklist items currently marked `fail`.
    pub fn qa_fail_count(&self) -> usize {
        self.qa_checklist.iter().filter(|i| i.status == QaStatus::Fail).count()
    }

    /// Read a `client_info` counter, defaulting to 0.
    pub fn client_info_u64(&self, key: &str) -> u64 {
        self.client_info.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Read a `client_info` string value.
    pub fn client_info_str(&self, key: &str) -> Option<&str> {
        self.client_info.get(key).and_then(Value::as_str)
    }

    /// The Ops redispatch counter.
    pub fn ops_retry_count(&self) -> u64 {
        self.client_info_u64("ops_retry_count")
    }

    /// The per-WO circuit-breaker counter for failed mark_failed attempts.
    pub fn ops_failure_attempts(&self) -> u64 {
        self.client_info_u64(&format!("ops_failure_attempt_{}", self.id))
    }
}

/// Input for creating a new work order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftWorkOrder {
    /// Explicit slug; when absent the store derives one from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub name: String,
    pub objective: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub assigned_actor: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<WorkOrderId>,
    #[serde(default)]
    pub client_info: Map<String, Value>,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P2Medium
    }
}

/// Derive a URL-safe slug from a human-readable name.
///
/// Lowercases, maps runs of non-alphanumerics to single dashes, and trims.
/// Uniqueness (suffixing on collision) is the store's responsibility.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("wo");
    }
    out
}

crate::test_builder! {
    pub struct WorkOrderBuilder => WorkOrder {
        coerce {
            id: WorkOrderId = "wko-test1",
            slug: String = "test-wo",
            name: String = "Test WO",
            objective: String = "do the thing",
            assigned_actor: String = "builder",
        }
        plain {
            acceptance_criteria: Vec<String> = Vec::new(),
            priority: Priority = Priority::P2Medium,
            status: WoStatus = WoStatus::InProgress,
            tags: BTreeSet<String> = BTreeSet::new(),
            qa_checklist: Vec<QaItem> = Vec::new(),
            client_info: Map<String, Value> = Map::new(),
            created_at: u64 = 1_000_000_000,
            updated_at: u64 = 1_000_000_000,
        }
        maybe {
            parent_id: WorkOrderId,
            summary: String,
            completed_at: u64,
        }
    }
}

#[cfg(test)]
#[path = "work_order_tests.rs"]
mod tests;
