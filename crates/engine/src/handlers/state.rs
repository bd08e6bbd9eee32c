// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-machine entry points: completion, failure, explicit transitions,
//! clarifications, and checklist maintenance.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, ToolCtx};
use crate::transition::{TransitionEngine, TransitionFault};
use fm_core::{
    ClarificationRequest, Clock, ExecutionLogEntry, Phase, QaItem, ToolError, ToolResult,
    Urgency, WoEvent, WoStatus, WorkOrder, WorkOrderId,
};
use fm_storage::Store;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct MarkCompleteInput {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct MarkFailedInput {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct TransitionStateInput {
    new_status: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestClarificationInput {
    question: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    urgency: Option<Urgency>,
}

#[derive(Debug, Deserialize)]
struct UpdateQaChecklistInput {
    items: Vec<QaItem>,
}

impl From<TransitionFault> for ToolError {
    fn from(fault: TransitionFault) -> Self {
        ToolError::new(fault.error_class(), fault.to_string())
    }
}

impl<C: Clock> Dispatcher<C> {
    pub(crate) async fn require_wo(&self, id: &WorkOrderId) -> Result<WorkOrder, ToolError> {
        self.store
            .work_order(id)
            .await
            .map_err(|e| ToolError::external(e.to_string()))?
            .ok_or_else(|| ToolError::invalid_input(format!("work order not found: {id}")))
    }

    pub(crate) async fn handle_mark_complete(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: MarkCompleteInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let wo = match self.require_wo(&ctx.wo_id).await {
            Ok(wo) => wo,
            Err(e) => return HandlerOutput::fail(e),
        };

        // Friendly pre-check; the transition engine enforces the same gate.
        if wo.has_deployment_tag() {
            let log = match self.store.execution_log(&wo.id).await {
                Ok(log) => log,
                Err(e) => return HandlerOutput::fail(ToolError::external(e.to_string())),
            };
            if !log.iter().any(|e| e.phase == Phase::DeploymentVerification) {
                return HandlerOutput::fail(ToolError::new(
                    fm_core::ErrorClass::InvalidTransition,
                    "BLOCKED: WO has deployment-related tags but no deployment_verification \
                     log entry exists; deploy and verify before completing",
                ));
            }
        }

        let mut summary = parsed.summary;
        if let Some(warning) = self.overlap_warning(&wo).await {
            summary = format!("{warning}\n\n{summary}");
        }

        let reviewed = match self
            .transitions
            .apply(&ctx.wo_id, WoEvent::SubmitForReview, &ctx.actor, Value::Null)
            .await
        {
            Ok(wo) => wo,
            Err(fault) => return HandlerOutput::fail(fault.into()),
        };

        // A clean checklist closes out immediately; fails hold in review.
        let final_status = if reviewed.qa_fail_count() == 0 {
            match self
                .transitions
                .apply(&ctx.wo_id, WoEvent::MarkDone, &ctx.actor, Value::Null)
                .await
            {
                Ok(wo) => wo.status,
                Err(fault) => return HandlerOutput::fail(fault.into()),
            }
        } else {
            reviewed.status
        };

        if let Err(e) = self.store.update_summary(&ctx.wo_id, &summary).await {
            tracing::warn!(wo = %ctx.wo_id, error = %e, "failed to persist summary");
        }

        let mut result = ToolResult::ok(json!({
            "status": final_status,
            "summary": summary,
        }));
        result.terminal = true;
        HandlerOutput::ok(result)
    }

    /// Warn when another in_progress WO shares a non-operational tag.
    async fn overlap_warning(&self, wo: &WorkOrder) -> Option<String> {
        let mine = wo.overlap_tags();
        if mine.is_empty() {
            return None;
        }
        let active = match self.store.work_orders_by_status(WoStatus::InProgress).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "overlap scan failed");
                return None;
            }
        };
        let mut overlapping: Vec<String> = active
            .iter()
            .filter(|other| other.id != wo.id)
            .filter(|other| other.overlap_tags().intersection(&mine).next().is_some())
            .map(|other| other.slug.clone())
            .collect();
        if overlapping.is_empty() {
            return None;
        }
        overlapping.sort();
        Some(format!(
            "NOTE: concurrent in_progress WO(s) share tags with this one: {}",
            overlapping.join(", ")
        ))
    }

    pub(crate) async fn handle_mark_failed(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: MarkFailedInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let payload = json!({ "reason": parsed.reason.clone() });
        if let Err(fault) =
            self.transitions.apply(&ctx.wo_id, WoEvent::MarkFailed, &ctx.actor, payload).await
        {
            return HandlerOutput::fail(fault.into());
        }
        if let Err(e) = self.store.update_summary(&ctx.wo_id, &parsed.reason).await {
            tracing::warn!(wo = %ctx.wo_id, error = %e, "failed to persist failure summary");
        }
        let entry = ExecutionLogEntry::event(
            ctx.wo_id,
            Phase::Failed,
            ctx.actor.name.clone(),
            "marked_failed",
            self.clock.epoch_ms(),
        )
        .with_detail("reason", Value::String(parsed.reason.clone()));
        if let Err(e) = self.store.append_execution_log(&entry).await {
            tracing::warn!(wo = %ctx.wo_id, error = %e, "failed to log failure entry");
        }

        let mut result = ToolResult::ok(json!({ "status": "failed", "reason": parsed.reason }));
        result.terminal = true;
        HandlerOutput::ok(result)
    }

    pub(crate) async fn handle_transition_state(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: TransitionStateInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let Some(desired) = WoStatus::parse(&parsed.new_status) else {
            return HandlerOutput::fail(ToolError::invalid_input(format!(
                "unknown status: {}",
                parsed.new_status
            )));
        };
        let wo = match self.require_wo(&ctx.wo_id).await {
            Ok(wo) => wo,
            Err(e) => return HandlerOutput::fail(e),
        };
        let Some(event) = TransitionEngine::<C>::event_for(wo.status, desired) else {
            return HandlerOutput::fail(ToolError::new(
                fm_core::ErrorClass::InvalidTransition,
                format!("no event moves {} to {desired}", wo.status),
            ));
        };
        let payload = match &parsed.summary {
            Some(summary) => json!({ "reason": summary }),
            None => Value::Null,
        };
        let updated =
            match self.transitions.apply(&ctx.wo_id, event, &ctx.actor, payload).await {
                Ok(wo) => wo,
                Err(fault) => return HandlerOutput::fail(fault.into()),
            };
        if let Some(summary) = &parsed.summary {
            if let Err(e) = self.store.update_summary(&ctx.wo_id, summary).await {
                tracing::warn!(wo = %ctx.wo_id, error = %e, "failed to persist summary");
            }
        }
        let mut result = ToolResult::ok(json!({ "status": updated.status, "event": event }));
        result.terminal = updated.status.is_terminal();
        HandlerOutput::ok(result)
    }

    pub(crate) async fn handle_request_clarification(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: RequestClarificationInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let mut request = ClarificationRequest::new(
            ctx.wo_id,
            parsed.question,
            parsed.urgency.unwrap_or_default(),
            self.clock.epoch_ms(),
        );
        request.context = parsed.context;
        request.options = parsed.options;

        let id = match self.store.create_clarification(&request).await {
            Ok(id) => id,
            Err(e) => return HandlerOutput::fail(ToolError::external(e.to_string())),
        };
        let payload = json!({ "clarification_id": id });
        if let Err(fault) = self
            .transitions
            .apply(&ctx.wo_id, WoEvent::RequestClarification, &ctx.actor, payload)
            .await
        {
            return HandlerOutput::fail(fault.into());
        }

        // terminal=true: the agent loop halts until a human answers.
        HandlerOutput::ok(ToolResult::terminal(json!({
            "clarification_id": id,
            "status": "pending",
        })))
    }

    /// Human-side answer path, invoked through the daemon rather than the
    /// tool surface. Resolves the pending request and resumes the WO.
    pub async fn answer_clarification(
        &self,
        wo_id: &WorkOrderId,
        response: &str,
        responded_by: &str,
    ) -> Result<(), ToolError> {
        let pending = self
            .store
            .pending_clarification(wo_id)
            .await
            .map_err(|e| ToolError::external(e.to_string()))?
            .ok_or_else(|| {
                ToolError::invalid_input(format!("no pending clarification for {wo_id}"))
            })?;
        self.store
            .resolve_clarification(&pending.id, response, responded_by)
            .await
            .map_err(|e| ToolError::external(e.to_string()))?;
        let actor = fm_core::Actor::master(responded_by);
        let payload = json!({ "clarification_id": pending.id, "response": response });
        self.transitions
            .apply(wo_id, WoEvent::AnswerClarification, &actor, payload)
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_update_qa_checklist(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: UpdateQaChecklistInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let wo = match self.require_wo(&ctx.wo_id).await {
            Ok(wo) => wo,
            Err(e) => return HandlerOutput::fail(e),
        };

        // Merge by item id; unknown ids append. Re-applying the same input
        // yields the same array.
        let mut merged = wo.qa_checklist.clone();
        for item in parsed.items {
            match merged.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item,
                None => merged.push(item),
            }
        }
        if let Err(e) = self.store.update_qa_checklist(&ctx.wo_id, &merged).await {
            return HandlerOutput::fail(ToolError::external(e.to_string()));
        }
        HandlerOutput::ok(ToolResult::ok(json!({ "qa_checklist": merged })))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
