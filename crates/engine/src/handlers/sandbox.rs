// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox handlers: bounded command execution, test runs, file writes.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, LedgerFacts, ToolCtx};
use fm_adapters::{ExecRequest, ExecResult, Sandbox as _};
use fm_core::{Clock, ToolError, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};

/// The full command whitelist for sandbox_exec.
pub(crate) const COMMAND_WHITELIST: [&str; 21] = [
    "grep", "find", "wc", "cat", "head", "tail", "echo", "test", "ls", "file", "deno", "diff",
    "jq", "node", "npm", "npx", "tsc", "python3", "git", "curl", "sed",
];

/// Commands run_tests accepts as the leading token.
const TEST_COMMANDS: [&str; 5] = ["npm", "npx", "node", "deno", "tsc"];

/// Shell metacharacters rejected in every arg.
const UNSAFE_CHARS: [char; 10] = ['|', '>', '<', ';', '&', '`', '$', '(', ')', '{'];
const UNSAFE_CLOSE_BRACE: char = '}';

const EXEC_DEFAULT_TIMEOUT_MS: u64 = 30_000;
const TEST_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Deserialize)]
struct SandboxExecInput {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SandboxWriteInput {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SandboxPipelineInput {
    commands: Vec<SandboxExecInput>,
}

#[derive(Debug, Deserialize)]
struct RunTestsInput {
    #[serde(default)]
    test_command: Option<String>,
}

/// Reject args carrying shell-injection characters.
pub(crate) fn check_arg_safety(args: &[String]) -> Result<(), ToolError> {
    for arg in args {
        if arg.chars().any(|c| UNSAFE_CHARS.contains(&c) || c == UNSAFE_CLOSE_BRACE) {
            return Err(ToolError::invalid_input(format!(
                "unsafe argument rejected (shell metacharacters): {arg}"
            )));
        }
    }
    Ok(())
}

fn check_whitelist(command: &str) -> Result<(), ToolError> {
    if COMMAND_WHITELIST.contains(&command) {
        Ok(())
    } else {
        Err(ToolError::permission_denied(format!("command not in whitelist: {command}")))
    }
}

fn exec_data(result: &ExecResult) -> Value {
    json!({
        "stdout": result.stdout,
        "stderr": result.stderr,
        "exit_code": result.exit_code,
    })
}

impl<C: Clock> Dispatcher<C> {
    /// Refresh the working tree once per WO per process lifetime.
    pub(crate) async fn ensure_pulled(&self, ctx: &ToolCtx) {
        if self.pulled.lock().contains(&ctx.wo_id) {
            return;
        }
        match self.sandbox.git_pull(&ctx.wo_slug).await {
            Ok(()) => {
                self.pulled.lock().insert(ctx.wo_id);
            }
            Err(e) => {
                tracing::warn!(wo = %ctx.wo_id, error = %e, "lazy git-pull failed");
            }
        }
    }

    pub(crate) async fn handle_sandbox_exec(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: SandboxExecInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        if let Err(e) = check_whitelist(&parsed.command).and_then(|()| check_arg_safety(&parsed.args))
        {
            return HandlerOutput::fail(e);
        }
        self.ensure_pulled(ctx).await;

        let request = ExecRequest {
            command: parsed.command.clone(),
            args: parsed.args.clone(),
            timeout_ms: parsed.timeout_ms.unwrap_or(EXEC_DEFAULT_TIMEOUT_MS),
            wo_slug: ctx.wo_slug.clone(),
        };
        let facts = LedgerFacts::new("sandbox", parsed.command.clone(), "EXEC")
            .with("args", json!(parsed.args));
        match self.sandbox.exec(&request).await {
            Ok(result) => HandlerOutput::ok_recorded(ToolResult::ok(exec_data(&result)), facts),
            Err(e) => HandlerOutput::fail_recorded(
                ToolError::new(e.error_class(), e.to_string()),
                facts,
            ),
        }
    }

    pub(crate) async fn handle_sandbox_write_file(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: SandboxWriteInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        self.ensure_pulled(ctx).await;

        // Text-only write via a node one-liner; content travels as argv,
        // never through a shell.
        let request = ExecRequest {
            command: "node".into(),
            args: vec![
                "-e".into(),
                "require('fs').writeFileSync(process.argv[1], process.argv[2])".into(),
                parsed.path.clone(),
                parsed.content.clone(),
            ],
            timeout_ms: EXEC_DEFAULT_TIMEOUT_MS,
            wo_slug: ctx.wo_slug.clone(),
        };
        let facts = LedgerFacts::new("sandbox", parsed.path.clone(), "WRITE")
            .with("bytes", json!(parsed.content.len()));
        match self.sandbox.exec(&request).await {
            Ok(result) if result.exit_code == 0 => HandlerOutput::ok_recorded(
                ToolResult::ok(json!({ "path": parsed.path, "bytes": parsed.content.len() })),
                facts,
            ),
            Ok(result) => HandlerOutput::fail_recorded(
                ToolError::external(format!("write failed: {}", result.stderr)),
                facts,
            ),
            Err(e) => HandlerOutput::fail_recorded(
                ToolError::new(e.error_class(), e.to_string()),
                facts,
            ),
        }
    }

    pub(crate) async fn handle_sandbox_pipeline(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: SandboxPipelineInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        if parsed.commands.is_empty() {
            return HandlerOutput::fail(ToolError::invalid_input("pipeline needs commands"));
        }
        let mut requests = Vec::with_capacity(parsed.commands.len());
        for command in &parsed.commands {
            if let Err(e) =
                check_whitelist(&command.command).and_then(|()| check_arg_safety(&command.args))
            {
                return HandlerOutput::fail(e);
            }
            requests.push(ExecRequest {
                command: command.command.clone(),
                args: command.args.clone(),
                timeout_ms: command.timeout_ms.unwrap_or(EXEC_DEFAULT_TIMEOUT_MS),
                wo_slug: ctx.wo_slug.clone(),
            });
        }
        self.ensure_pulled(ctx).await;

        let facts = LedgerFacts::new("sandbox", "pipeline", "EXEC")
            .with("commands", json!(requests.len()));
        match self.sandbox.pipeline(&requests).await {
            Ok(results) => {
                let data: Vec<Value> = results.iter().map(exec_data).collect();
                HandlerOutput::ok_recorded(ToolResult::ok(Value::Array(data)), facts)
            }
            Err(e) => HandlerOutput::fail_recorded(
                ToolError::new(e.error_class(), e.to_string()),
                facts,
            ),
        }
    }

    pub(crate) async fn handle_run_tests(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: RunTestsInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let command_line = parsed.test_command.unwrap_or_else(|| "npm test".to_string());
        let mut tokens = command_line.split_whitespace().map(String::from);
        let Some(command) = tokens.next() else {
            return HandlerOutput::fail(ToolError::invalid_input("empty test command"));
        };
        let args: Vec<String> = tokens.collect();
        if !TEST_COMMANDS.contains(&command.as_str()) {
            return HandlerOutput::fail(ToolError::permission_denied(format!(
                "test command must start with one of {TEST_COMMANDS:?}, got {command}"
            )));
        }
        if let Err(e) = check_arg_safety(&args) {
            return HandlerOutput::fail(e);
        }
        self.ensure_pulled(ctx).await;

        let request = ExecRequest {
            command: command.clone(),
            args,
            timeout_ms: TEST_TIMEOUT_MS,
            wo_slug: ctx.wo_slug.clone(),
        };
        let facts = LedgerFacts::new("sandbox", command_line.clone(), "TEST");
        match self.sandbox.exec(&request).await {
            Ok(result) => {
                let passed = result.exit_code == 0;
                let mut data = exec_data(&result);
                if let Value::Object(map) = &mut data {
                    map.insert("passed".into(), Value::Bool(passed));
                }
                HandlerOutput::ok_recorded(ToolResult::ok(data), facts)
            }
            Err(e) => HandlerOutput::fail_recorded(
                ToolError::new(e.error_class(), e.to_string()),
                facts,
            ),
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
