// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-order status state machine.
//!
//! [`next_status`] is the single source of truth for which event is legal
//! from which status. It is a pure table; guards that need store context
//! (actor scoping, deployment verification, checklist state) are enforced
//! by the transition engine that invokes it.

use crate::work_order::WorkOrderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The set of work-order statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WoStatus {
    Draft,
    Ready,
    PendingApproval,
    InProgress,
    Blocked,
    BlockedOnInput,
    Review,
    Done,
    Cancelled,
    Failed,
}

crate::display_labels! {
    WoStatus {
        Draft => "draft",
        Ready => "ready",
        PendingApproval => "pending_approval",
        InProgress => "in_progress",
        Blocked => "blocked",
        BlockedOnInput => "blocked_on_input",
        Review => "review",
        Done => "done",
        Cancelled => "cancelled",
        Failed => "failed",
    }
}

impl WoStatus {
    /// Whether this is a terminal status (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }

    /// Parse the snake_case form used in protocol payloads.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "ready" => Some(Self::Ready),
            "pending_approval" => Some(Self::PendingApproval),
            "in_progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "blocked_on_input" => Some(Self::BlockedOnInput),
            "review" => Some(Self::Review),
            "done" => Some(Self::Done),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Events that drive status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WoEvent {
    StartWork,
    Approve,
    Reject,
    SubmitForReview,
    MarkDone,
    MarkFailed,
    Cancel,
    RequestClarification,
    AnswerClarification,
    Block,
    Unblock,
}

crate::display_labels! {
    WoEvent {
        StartWork => "start_work",
        Approve => "approve",
        Reject => "reject",
        SubmitForReview => "submit_for_review",
        MarkDone => "mark_done",
        MarkFailed => "mark_failed",
        Cancel => "cancel",
        RequestClarification => "request_clarification",
        AnswerClarification => "answer_clarification",
        Block => "block",
        Unblock => "unblock",
    }
}

/// Events that must carry a human-readable reason in their payload.
pub fn requires_reason(event: WoEvent) -> bool {
    matches!(event, WoEvent::MarkFailed | WoEvent::Reject)
}

/// Error returned when an event is not legal from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event} from {from}")]
pub struct TransitionError {
    pub from: WoStatus,
    pub event: WoEvent,
}

/// Compute the status an event leads to, or reject it.
///
/// Edges not in the table are rejected. `mark_failed` and `cancel` are
/// legal from every non-terminal status.
pub fn next_status(from: WoStatus, event: WoEvent) -> Result<WoStatus, TransitionError> {
    use WoEvent::*;
    use WoStatus::*;

    if !from.is_terminal() {
        match event {
            MarkFailed => return Ok(Failed),
            Cancel => return Ok(Cancelled),
            _ => {}
        }
    }

    match (from, event) {
        (Draft, Approve) => Ok(Ready),
        (PendingApproval, Approve) => Ok(Ready),
        (PendingApproval, Reject) => Ok(Draft),
        (Ready, StartWork) => Ok(InProgress),
        (Ready, Block) => Ok(Blocked),
        (InProgress, SubmitForReview) => Ok(Review),
        (InProgress, RequestClarification) => Ok(BlockedOnInput),
        (InProgress, Block) => Ok(Blocked),
        (Blocked, Unblock) => Ok(InProgress),
        (BlockedOnInput, AnswerClarification) => Ok(InProgress),
        (Review, MarkDone) => Ok(Done),
        (Review, Reject) => Ok(InProgress),
        _ => Err(TransitionError { from, event }),
    }
}

/// One journal row per state-machine transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoEventRecord {
    pub work_order_id: WorkOrderId,
    pub event_type: WoEvent,
    pub previous_status: WoStatus,
    pub new_status: WoStatus,
    pub actor: String,
    #[serde(default)]
    pub payload: Value,
    pub created_at: u64,
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
