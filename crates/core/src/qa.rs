// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QA checklist items and findings.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};

/// Status of a single checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Pass,
    Fail,
    Pending,
    Na,
}

crate::display_labels! {
    QaStatus {
        Pass => "pass",
        Fail => "fail",
        Pending => "pending",
        Na => "na",
    }
}

/// One entry of a work order's QA checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaItem {
    pub id: String,
    pub criterion: String,
    pub status: QaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Outcome classification for a recorded QA finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    Info,
    Warn,
    Fail,
    Pass,
}

crate::display_labels! {
    FindingType {
        Info => "info",
        Warn => "warn",
        Fail => "fail",
        Pass => "pass",
    }
}

/// A QA observation attached to a work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFinding {
    pub work_order_id: WorkOrderId,
    pub finding_type: FindingType,
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<u64>,
}
