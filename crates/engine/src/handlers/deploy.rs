// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edge-function deploy handler.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, LedgerFacts, ToolCtx};
use fm_adapters::{DeployFile, EdgeDeploy as _};
use fm_core::{Clock, ExecutionLogEntry, Phase, ToolError, ToolResult};
use fm_storage::Store as _;
use serde::Deserialize;
use serde_json::{json, Value};

/// Payloads above this must use the offline CLI path.
const DEPLOY_CONTENT_MAX: usize = 50_000;

#[derive(Debug, Deserialize)]
struct DeployInput {
    function_name: String,
    files: Vec<DeployFile>,
    #[serde(default)]
    entrypoint: Option<String>,
}

impl<C: Clock> Dispatcher<C> {
    pub(crate) async fn handle_deploy(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: DeployInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        if parsed.files.is_empty() {
            return HandlerOutput::fail(ToolError::invalid_input("deploy needs files"));
        }
        let total: usize = parsed.files.iter().map(|f| f.content.len()).sum();
        if total > DEPLOY_CONTENT_MAX {
            return HandlerOutput::fail(ToolError::invalid_input(format!(
                "deploy payload is {total} chars (max {DEPLOY_CONTENT_MAX}); use the offline CLI path"
            )));
        }

        let facts = LedgerFacts::new("edge_function", parsed.function_name.clone(), "DEPLOY")
            .with("files", json!(parsed.files.len()));

        let exists = match self.deploy.function_exists(&parsed.function_name).await {
            Ok(exists) => exists,
            Err(e) => {
                return HandlerOutput::fail_recorded(
                    ToolError::new(e.error_class(), e.to_string()),
                    facts,
                )
            }
        };
        let entrypoint = parsed.entrypoint.as_deref();
        let outcome = if exists {
            self.deploy.update_function(&parsed.function_name, &parsed.files, entrypoint).await
        } else {
            self.deploy.create_function(&parsed.function_name, &parsed.files, entrypoint).await
        };
        if let Err(e) = outcome {
            return HandlerOutput::fail_recorded(
                ToolError::new(e.error_class(), e.to_string()),
                facts,
            );
        }

        let verification_passed = match self.deploy.probe(&parsed.function_name).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(function = %parsed.function_name, error = %e, "deploy probe failed");
                false
            }
        };

        // The completion gate for deployment-tagged WOs keys off this
        // entry, so it is written regardless of the probe's outcome.
        let entry = ExecutionLogEntry::event(
            ctx.wo_id,
            Phase::DeploymentVerification,
            ctx.actor.name.clone(),
            "deploy_probe",
            self.clock.epoch_ms(),
        )
        .with_detail("function", Value::String(parsed.function_name.clone()))
        .with_detail("verification_passed", Value::Bool(verification_passed));
        if let Err(e) = self.store.append_execution_log(&entry).await {
            tracing::error!(error = %e, "failed to log deployment_verification entry");
        }

        HandlerOutput::ok_recorded(
            ToolResult::ok(json!({
                "function": parsed.function_name,
                "action": if exists { "updated" } else { "created" },
                "verification_passed": verification_passed,
            })),
            facts.with("verification_passed", Value::Bool(verification_passed)),
        )
    }
}
