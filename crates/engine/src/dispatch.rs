// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool dispatcher: the single entry point for every side-effectful agent
//! action.
//!
//! Processing order: permission gate (mutating tools), proxy routing,
//! handler execution, ledger recording, activity narration. Handlers never
//! throw; every failure is converted into a `ToolResult` at this boundary.

use crate::registry::{ToolKind, ToolRegistry};
use crate::transition::TransitionEngine;
use fm_adapters::{EdgeDeploy, GitHost, Sandbox, VerifyProxy};
use fm_core::{
    clip, Actor, Clock, ErrorClass, ExecutionLogEntry, MutationRecord, Permission, Phase,
    ProxyMode, ToolError, ToolResult, WorkOrderId,
};
use fm_storage::{result_hash, MutationLedger, Store};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const ERROR_DETAIL_MAX: usize = 500;

/// Context of one dispatch call: who is acting, on which WO.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    pub actor: Actor,
    pub wo_id: WorkOrderId,
    pub wo_slug: String,
}

/// Adapter dependencies injected into the dispatcher.
pub struct DispatcherDeps {
    pub store: Arc<dyn Store>,
    pub git: Arc<dyn GitHost>,
    pub sandbox: Arc<dyn Sandbox>,
    pub deploy: Arc<dyn EdgeDeploy>,
    pub proxy: Option<Arc<dyn VerifyProxy>>,
}

/// Tunables for dispatch behavior.
pub struct DispatcherConfig {
    /// Branch used when read tools omit a ref.
    pub default_branch: String,
    /// Window for the anti-clobber scan before writes.
    pub anti_clobber_window_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { default_branch: "main".into(), anti_clobber_window_ms: 24 * 60 * 60 * 1000 }
    }
}

/// Ledger extraction for one handler run.
pub(crate) struct LedgerFacts {
    pub object_type: String,
    pub object_id: String,
    pub action: String,
    pub context: Map<String, Value>,
}

impl LedgerFacts {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            action: action.into(),
            context: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// What a handler hands back to the dispatch pipeline.
pub(crate) struct HandlerOutput {
    pub result: ToolResult,
    /// Present for calls the ledger must record. Reads withhold it.
    pub facts: Option<LedgerFacts>,
    pub error_class: Option<ErrorClass>,
}

impl HandlerOutput {
    pub fn ok(result: ToolResult) -> Self {
        Self { result, facts: None, error_class: None }
    }

    pub fn ok_recorded(result: ToolResult, facts: LedgerFacts) -> Self {
        Self { result, facts: Some(facts), error_class: None }
    }

    pub fn fail(err: ToolError) -> Self {
        Self { result: ToolResult::err(err.message), facts: None, error_class: Some(err.class) }
    }

    pub fn fail_recorded(err: ToolError, facts: LedgerFacts) -> Self {
        Self {
            result: ToolResult::err(err.message),
            facts: Some(facts),
            error_class: Some(err.class),
        }
    }
}

/// Parse a tool's input mapping into its typed schema.
pub(crate) fn parse_input<T: DeserializeOwned>(input: &Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone())
        .map_err(|e| ToolError::invalid_input(format!("invalid input: {e}")))
}

/// The registry + policy layer that runs handlers.
pub struct Dispatcher<C: Clock> {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) git: Arc<dyn GitHost>,
    pub(crate) sandbox: Arc<dyn Sandbox>,
    pub(crate) deploy: Arc<dyn EdgeDeploy>,
    pub(crate) proxy: Option<Arc<dyn VerifyProxy>>,
    pub(crate) ledger: MutationLedger,
    pub(crate) transitions: TransitionEngine<C>,
    pub(crate) registry: ToolRegistry,
    pub(crate) config: DispatcherConfig,
    pub(crate) clock: C,
    /// WOs whose sandbox working tree was already pulled in this process.
    /// A latency optimization, not a correctness invariant.
    pub(crate) pulled: Mutex<HashSet<WorkOrderId>>,
    /// Client for web_fetch, capped at its 10s contract.
    pub(crate) web: reqwest::Client,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(deps: DispatcherDeps, config: DispatcherConfig, clock: C) -> Self {
        let ledger = MutationLedger::new(Arc::clone(&deps.store));
        let transitions = TransitionEngine::new(Arc::clone(&deps.store), clock.clone());
        Self {
            store: deps.store,
            git: deps.git,
            sandbox: deps.sandbox,
            deploy: deps.deploy,
            proxy: deps.proxy,
            ledger,
            transitions,
            registry: ToolRegistry::standard(),
            config,
            clock,
            pulled: Mutex::new(HashSet::new()),
            web: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn transitions(&self) -> &TransitionEngine<C> {
        &self.transitions
    }

    /// Dispatch one tool call. Never panics, never throws: every outcome is
    /// a `ToolResult`.
    pub async fn dispatch(&self, tool_name: &str, input: Value, ctx: &ToolCtx) -> ToolResult {
        let Some(def) = self.registry.get(tool_name).copied() else {
            return ToolResult::err(format!("unknown tool: {tool_name}"));
        };
        tracing::info!(tool = tool_name, wo = %ctx.wo_id, actor = %ctx.actor.name, "dispatch");

        if def.mutating {
            // Read-only actors may still run execute_sql; the SQL handler
            // rejects write keywords for them.
            if ctx.actor.is_read_only() && def.kind != ToolKind::ExecuteSql {
                return self
                    .deny(tool_name, ctx, format!("read-only actor cannot use {tool_name}"))
                    .await;
            }
            match self.store.check_agent_permission(&ctx.actor.name, tool_name).await {
                Ok(Permission::Deny) => {
                    return self
                        .deny(
                            tool_name,
                            ctx,
                            format!("actor {} is not permitted to use {tool_name}", ctx.actor.name),
                        )
                        .await;
                }
                // Unspecified defaults to allow (fail-open); a failing
                // permission lookup must not block the tool surface.
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(tool = tool_name, error = %e, "permission lookup failed; allowing");
                }
            }
        }

        if def.proxy_eligible {
            if let Some(proxy) = &self.proxy {
                match proxy.forward(tool_name, &input, &ctx.actor.name, &ctx.wo_id).await {
                    Ok(Some(result)) => {
                        // The proxy executed and recorded with
                        // proxy_mode=edge_proxy; do not record in-process.
                        self.log_activity(tool_name, &def.kind, true, result.success, ctx).await;
                        return result;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(tool = tool_name, error = %e, "verify proxy unavailable; executing in-process");
                    }
                }
            }
        }

        let output = self.run_handler(def.kind, &input, ctx).await;

        if def.mutating {
            if let Some(facts) = &output.facts {
                let payload = output.result.hash_payload();
                let record = MutationRecord {
                    work_order_id: ctx.wo_id,
                    tool_name: tool_name.to_string(),
                    object_type: facts.object_type.clone(),
                    object_id: facts.object_id.clone(),
                    action: facts.action.clone(),
                    success: output.result.success,
                    verified: None,
                    error_class: output.error_class,
                    error_detail: output
                        .result
                        .error
                        .as_deref()
                        .map(|e| clip(e, ERROR_DETAIL_MAX).to_string()),
                    context: facts.context.clone(),
                    result_hash: Some(result_hash(&payload)),
                    proxy_mode: ProxyMode::SelfReport,
                    actor: ctx.actor.name.clone(),
                    created_at: self.clock.epoch_ms(),
                };
                // Handler success never depends on ledger success.
                let _ = self.ledger.record(record).await;
            }
        }

        let wrote = def.mutating && output.facts.is_some();
        self.log_activity(tool_name, &def.kind, wrote, output.result.success, ctx).await;
        output.result
    }

    /// Record and return a permission denial for a mutating tool.
    async fn deny(&self, tool_name: &str, ctx: &ToolCtx, message: String) -> ToolResult {
        let result = ToolResult::err(format!("permission denied: {message}"));
        let record = MutationRecord {
            work_order_id: ctx.wo_id,
            tool_name: tool_name.to_string(),
            object_type: "tool".into(),
            object_id: tool_name.to_string(),
            action: "DENIED".into(),
            success: false,
            verified: None,
            error_class: Some(ErrorClass::PermissionDenied),
            error_detail: Some(message),
            context: Map::new(),
            result_hash: Some(result_hash(&result.hash_payload())),
            proxy_mode: ProxyMode::SelfReport,
            actor: ctx.actor.name.clone(),
            created_at: self.clock.epoch_ms(),
        };
        let _ = self.ledger.record(record).await;
        result
    }

    /// Narrate the call into the execution log; the Ops loop derives
    /// last-activity and read/write ratios from these rows.
    async fn log_activity(
        &self,
        tool_name: &str,
        kind: &ToolKind,
        wrote: bool,
        success: bool,
        ctx: &ToolCtx,
    ) {
        let access = if wrote {
            "write"
        } else if Self::is_state_kind(kind) {
            "control"
        } else {
            "read"
        };
        let entry = ExecutionLogEntry::event(
            ctx.wo_id,
            Phase::Stream,
            ctx.actor.name.clone(),
            "tool_call",
            self.clock.epoch_ms(),
        )
        .with_detail("tool", Value::String(tool_name.to_string()))
        .with_detail("access", Value::String(access.to_string()))
        .with_detail("success", Value::Bool(success));
        if let Err(e) = self.store.append_execution_log(&entry).await {
            tracing::warn!(tool = tool_name, error = %e, "failed to narrate tool call");
        }
    }

    fn is_state_kind(kind: &ToolKind) -> bool {
        matches!(
            kind,
            ToolKind::MarkComplete
                | ToolKind::MarkFailed
                | ToolKind::TransitionState
                | ToolKind::RequestClarification
                | ToolKind::DelegateSubtask
                | ToolKind::UpdateQaChecklist
        )
    }

    async fn run_handler(&self, kind: ToolKind, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        match kind {
            ToolKind::ExecuteSql => self.handle_execute_sql(input, ctx).await,
            ToolKind::ApplyMigration => self.handle_apply_migration(input, ctx).await,
            ToolKind::GithubPushFiles => self.handle_push_files(input, ctx).await,
            ToolKind::SandboxExec => self.handle_sandbox_exec(input, ctx).await,
            ToolKind::SandboxWriteFile => self.handle_sandbox_write_file(input, ctx).await,
            ToolKind::SandboxPipeline => self.handle_sandbox_pipeline(input, ctx).await,
            ToolKind::RunTests => self.handle_run_tests(input, ctx).await,
            ToolKind::DeployEdgeFunction => self.handle_deploy(input, ctx).await,
            ToolKind::MarkComplete => self.handle_mark_complete(input, ctx).await,
            ToolKind::MarkFailed => self.handle_mark_failed(input, ctx).await,
            ToolKind::TransitionState => self.handle_transition_state(input, ctx).await,
            ToolKind::RequestClarification => self.handle_request_clarification(input, ctx).await,
            ToolKind::DelegateSubtask => self.handle_delegate_subtask(input, ctx).await,
            ToolKind::UpdateQaChecklist => self.handle_update_qa_checklist(input, ctx).await,
            _ => self.handle_read(kind, input, ctx).await,
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
