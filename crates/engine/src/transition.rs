// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition engine: the single entry for state change.
//!
//! Guards are checked against the core transition table, the transition RPC
//! is invoked, and the WO row is re-read. A stale status after a successful
//! RPC is the integrity violation this layer exists to catch
//! (`ERR_STATUS_MISMATCH`).

use fm_core::{
    next_status, requires_reason, Actor, Clock, ErrorClass, ErrorEvent, Phase, TransitionError,
    WoEvent, WoEventRecord, WoStatus, WorkOrder, WorkOrderId,
};
use fm_storage::{Store, StoreError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Why a transition did not happen.
#[derive(Debug, Error)]
pub enum TransitionFault {
    #[error("{0}")]
    Invalid(#[from] TransitionError),
    #[error("Status transition failed: DB shows {observed} instead of {expected}")]
    StatusMismatch { expected: WoStatus, observed: WoStatus },
    #[error("{event} requires a reason")]
    MissingReason { event: WoEvent },
    #[error("work order not found: {0}")]
    NotFound(WorkOrderId),
    #[error("actor {actor} is not authorized to {event} this work order")]
    NotAuthorized { actor: String, event: WoEvent },
    #[error("checklist has {fails} failing item(s)")]
    ChecklistFails { fails: usize },
    #[error(
        "BLOCKED: WO has deployment-related tags but no deployment_verification log entry exists"
    )]
    DeploymentUnverified,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TransitionFault {
    pub fn error_class(&self) -> ErrorClass {
        match self {
            TransitionFault::Invalid(_) => ErrorClass::InvalidTransition,
            TransitionFault::StatusMismatch { .. } => ErrorClass::StatusMismatch,
            TransitionFault::MissingReason { .. } => ErrorClass::InvalidInput,
            TransitionFault::NotFound(_) => ErrorClass::InvalidInput,
            TransitionFault::NotAuthorized { .. } => ErrorClass::PermissionDenied,
            TransitionFault::ChecklistFails { .. } => ErrorClass::InvalidTransition,
            TransitionFault::DeploymentUnverified => ErrorClass::InvalidTransition,
            TransitionFault::Store(_) => ErrorClass::ExternalFailure,
        }
    }
}

/// Applies events to WOs through the store, with post-transition
/// verification and journaling.
pub struct TransitionEngine<C: Clock> {
    store: Arc<dyn Store>,
    clock: C,
}

impl<C: Clock> Clone for TransitionEngine<C> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), clock: self.clock.clone() }
    }
}

impl<C: Clock> TransitionEngine<C> {
    pub fn new(store: Arc<dyn Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Apply one event. Returns the re-read, verified WO row.
    pub async fn apply(
        &self,
        wo_id: &WorkOrderId,
        event: WoEvent,
        actor: &Actor,
        payload: Value,
    ) -> Result<WorkOrder, TransitionFault> {
        let wo = self
            .store
            .work_order(wo_id)
            .await?
            .ok_or(TransitionFault::NotFound(*wo_id))?;
        let previous = wo.status;
        let expected = next_status(previous, event)?;

        if requires_reason(event) {
            let has_reason = payload
                .get("reason")
                .and_then(Value::as_str)
                .is_some_and(|r| !r.trim().is_empty());
            if !has_reason {
                return Err(TransitionFault::MissingReason { event });
            }
        }
        self.check_guards(&wo, event, actor).await?;

        self.store.wo_transition(wo_id, event, &actor.name, &payload).await?;

        // Re-read: optimistic or silently-rejected transitions surface here.
        let observed = self
            .store
            .work_order(wo_id)
            .await?
            .ok_or(TransitionFault::NotFound(*wo_id))?;
        if observed.status != expected {
            tracing::error!(
                wo = %wo_id,
                event = %event,
                expected = %expected,
                observed = %observed.status,
                "transition rpc reported success but row disagrees"
            );
            let diag = ErrorEvent {
                code: "ERR_STATUS_MISMATCH".into(),
                source: "transition".into(),
                work_order_id: Some(*wo_id),
                detail: format!(
                    "rpc accepted {event} but row shows {} (expected {expected})",
                    observed.status
                ),
                created_at: self.clock.epoch_ms(),
            };
            if let Err(e) = self.store.record_error_event(&diag).await {
                tracing::error!(error = %e, "failed to write ERR_STATUS_MISMATCH diagnostic");
            }
            return Err(TransitionFault::StatusMismatch { expected, observed: observed.status });
        }

        let record = WoEventRecord {
            work_order_id: *wo_id,
            event_type: event,
            previous_status: previous,
            new_status: expected,
            actor: actor.name.clone(),
            payload,
            created_at: self.clock.epoch_ms(),
        };
        if let Err(e) = self.store.append_wo_event(&record).await {
            tracing::error!(wo = %wo_id, error = %e, "failed to journal wo event");
        }

        tracing::info!(wo = %wo_id, event = %event, from = %previous, to = %expected, "transition");
        Ok(observed)
    }

    /// Guards that need store context. The pure table check already ran.
    async fn check_guards(
        &self,
        wo: &WorkOrder,
        event: WoEvent,
        actor: &Actor,
    ) -> Result<(), TransitionFault> {
        match event {
            WoEvent::StartWork | WoEvent::Cancel => {
                if actor.name != wo.assigned_actor && !actor.is_master() {
                    return Err(TransitionFault::NotAuthorized {
                        actor: actor.name.clone(),
                        event,
                    });
                }
            }
            WoEvent::MarkDone => {
                let fails = wo.qa_fail_count();
                if fails > 0 && !actor.is_master() {
                    return Err(TransitionFault::ChecklistFails { fails });
                }
            }
            WoEvent::SubmitForReview => {
                if wo.has_deployment_tag() {
                    let log = self.store.execution_log(&wo.id).await?;
                    let verified =
                        log.iter().any(|e| e.phase == Phase::DeploymentVerification);
                    if !verified {
                        return Err(TransitionFault::DeploymentUnverified);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The event that moves `current` to `desired`, if the table has one.
    pub fn event_for(current: WoStatus, desired: WoStatus) -> Option<WoEvent> {
        const EVENTS: [WoEvent; 11] = [
            WoEvent::StartWork,
            WoEvent::Approve,
            WoEvent::Reject,
            WoEvent::SubmitForReview,
            WoEvent::MarkDone,
            WoEvent::MarkFailed,
            WoEvent::Cancel,
            WoEvent::RequestClarification,
            WoEvent::AnswerClarification,
            WoEvent::Block,
            WoEvent::Unblock,
        ];
        EVENTS.into_iter().find(|e| next_status(current, *e) == Ok(desired))
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
