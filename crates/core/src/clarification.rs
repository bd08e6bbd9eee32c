// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clarification requests: the canonical suspension point for human input.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a clarification request.
    pub struct ClarificationId("clr");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

crate::display_labels! {
    Urgency {
        Low => "low",
        Normal => "normal",
        High => "high",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationStatus {
    Pending,
    Answered,
    Expired,
}

crate::display_labels! {
    ClarificationStatus {
        Pending => "pending",
        Answered => "answered",
        Expired => "expired",
    }
}

/// A question an agent raised to its human collaborators. The WO holding a
/// pending request is suspended (`blocked_on_input`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub id: ClarificationId,
    pub work_order_id: WorkOrderId,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
    pub status: ClarificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<u64>,
}

impl ClarificationRequest {
    pub fn new(
        work_order_id: WorkOrderId,
        question: impl Into<String>,
        urgency: Urgency,
        created_at: u64,
    ) -> Self {
        Self {
            id: ClarificationId::new(),
            work_order_id,
            question: question.into(),
            context: None,
            options: Vec::new(),
            urgency,
            status: ClarificationStatus::Pending,
            response: None,
            responded_by: None,
            created_at,
            answered_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ClarificationStatus::Pending
    }
}
