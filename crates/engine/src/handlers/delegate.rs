// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sub-WO delegation: child creation with tag inheritance, model-tier
//! assignment, and team-context injection.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, ToolCtx};
use fm_core::{
    Actor, Clock, ContextId, ContextType, DraftWorkOrder, Priority, TeamContext, ToolError,
    ToolResult, WoEvent, WorkOrder, WorkOrderId,
};
use fm_storage::Store as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Parent-walk bound; WO trees are DAGs but depth is defensive-bounded.
const MAX_TREE_DEPTH: usize = 32;

/// Name the runtime transitions freshly delegated children under.
const RUNTIME_ACTOR: &str = "wo-runtime";

#[derive(Debug, Deserialize)]
struct DelegateInput {
    name: String,
    objective: String,
    acceptance_criteria: String,
    #[serde(default)]
    model_tier: Option<String>,
    #[serde(default)]
    context_injection: Option<String>,
    #[serde(default)]
    assigned_actor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckChildInput {
    child_slug: String,
}

/// Model tier → concrete model id.
fn model_for_tier(tier: &str) -> Result<&'static str, ToolError> {
    match tier {
        "opus" => Ok("claude-opus-4-1-20250805"),
        "sonnet" => Ok("claude-sonnet-4-5-20250929"),
        "haiku" => Ok("claude-3-5-haiku-20241022"),
        other => Err(ToolError::invalid_input(format!(
            "model_tier must be one of opus|sonnet|haiku, got {other}"
        ))),
    }
}

impl<C: Clock> Dispatcher<C> {
    /// Root of a WO tree, walking `parent_id` upward.
    pub(crate) async fn root_of(&self, wo: &WorkOrder) -> Result<WorkOrderId, ToolError> {
        let mut current = wo.clone();
        for _ in 0..MAX_TREE_DEPTH {
            let Some(parent_id) = current.parent_id else {
                return Ok(current.id);
            };
            current = self
                .store
                .work_order(&parent_id)
                .await
                .map_err(|e| ToolError::external(e.to_string()))?
                .ok_or_else(|| {
                    ToolError::invalid_input(format!("dangling parent_id: {parent_id}"))
                })?;
        }
        Err(ToolError::invalid_input("work-order tree exceeds depth bound"))
    }

    pub(crate) async fn handle_delegate_subtask(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: DelegateInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let parent = match self.require_wo(&ctx.wo_id).await {
            Ok(wo) => wo,
            Err(e) => return HandlerOutput::fail(e),
        };

        let model = match model_for_tier(parsed.model_tier.as_deref().unwrap_or("sonnet")) {
            Ok(model) => model,
            Err(e) => return HandlerOutput::fail(e),
        };

        let mut tags = parent.inheritable_tags();
        tags.insert(format!("parent:{}", parent.slug));

        let acceptance_criteria: Vec<String> = parsed
            .acceptance_criteria
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        let mut client_info = Map::new();
        client_info.insert("model".into(), Value::String(model.to_string()));
        client_info.insert("delegated_by".into(), Value::String(ctx.actor.name.clone()));

        let draft = DraftWorkOrder {
            slug: None,
            name: parsed.name,
            objective: parsed.objective,
            acceptance_criteria,
            priority: Priority::P2Medium,
            assigned_actor: parsed.assigned_actor.unwrap_or_else(|| ctx.actor.name.clone()),
            tags,
            parent_id: Some(parent.id),
            client_info,
        };
        let child = match self.store.create_work_order(draft).await {
            Ok(child) => child,
            Err(e) => return HandlerOutput::fail(ToolError::external(e.to_string())),
        };

        // Low-priority children auto-approve to ready at creation; the
        // runtime starts them immediately.
        let runtime = Actor::master(RUNTIME_ACTOR);
        if let Err(fault) =
            self.transitions.apply(&child.id, WoEvent::StartWork, &runtime, Value::Null).await
        {
            return HandlerOutput::fail(fault.into());
        }

        if let Some(content) = parsed.context_injection {
            match self.root_of(&parent).await {
                Ok(root) => {
                    let entry = TeamContext {
                        id: ContextId::new(),
                        root_wo_id: root,
                        author_actor: ctx.actor.name.clone(),
                        context_type: ContextType::Plan,
                        content,
                        metadata: Map::new(),
                        created_at: self.clock.epoch_ms(),
                    };
                    if let Err(e) = self.store.write_team_context(&entry).await {
                        tracing::warn!(error = %e, "failed to write team context");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not resolve root for team context"),
            }
        }

        // Non-blocking: the parent resumes immediately with the child slug.
        HandlerOutput::ok(ToolResult::ok(json!({
            "child_slug": child.slug,
            "child_id": child.id,
            "model": model,
            "status": "in_progress",
        })))
    }

    pub(crate) async fn handle_check_child_status(
        &self,
        input: &Value,
        _ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: CheckChildInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        match self.store.work_order_by_slug(&parsed.child_slug).await {
            Ok(Some(child)) => HandlerOutput::ok(ToolResult::ok(json!({
                "slug": child.slug,
                "status": child.status,
                "terminal": child.status.is_terminal(),
                "summary": child.summary,
            }))),
            Ok(None) => HandlerOutput::fail(ToolError::invalid_input(format!(
                "no work order with slug {}",
                parsed.child_slug
            ))),
            Err(e) => HandlerOutput::fail(ToolError::external(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "delegate_tests.rs"]
mod tests;
