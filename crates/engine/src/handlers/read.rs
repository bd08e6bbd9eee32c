// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only tools. None of these produce ledger entries.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, ToolCtx};
use crate::handlers::sandbox::check_arg_safety;
use crate::registry::ToolKind;
use fm_adapters::{ExecRequest, GitHost as _, Sandbox as _};
use fm_core::{clip, Clock, ToolError, ToolResult};
use fm_storage::Store as _;
use serde::Deserialize;
use serde_json::{json, Value};

/// Contents-API reads cap at 10k chars; read_full_file avoids this.
const CONTENTS_READ_MAX: usize = 10_000;
/// web_fetch response cap.
const WEB_FETCH_MAX: usize = 20_000;

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeInput {
    path: String,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    start_line: usize,
    end_line: usize,
}

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(default)]
    path: Option<String>,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryInput {
    query: String,
}

#[derive(Debug, Deserialize)]
struct GrepInput {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeInput {
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    recursive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LogInput {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DiffInput {
    base: String,
    head: String,
}

#[derive(Debug, Deserialize)]
struct TableInput {
    table: String,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExecutionLogInput {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FetchInput {
    url: String,
}

fn ok(data: Value) -> HandlerOutput {
    HandlerOutput::ok(ToolResult::ok(data))
}

fn fail(e: ToolError) -> HandlerOutput {
    HandlerOutput::fail(e)
}

impl<C: Clock> Dispatcher<C> {
    pub(crate) async fn handle_read(
        &self,
        kind: ToolKind,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        match kind {
            ToolKind::GithubReadFile => self.read_file(input, false).await,
            ToolKind::ReadFullFile => self.read_file(input, true).await,
            ToolKind::GithubReadFileRange => self.read_file_range(input).await,
            ToolKind::GithubListFiles => self.list_files(input).await,
            ToolKind::GithubSearchCode => self.search_code(input).await,
            ToolKind::GithubGrep => self.grep(input, ctx).await,
            ToolKind::GithubTree => self.tree(input).await,
            ToolKind::GitLog => self.git_log(input).await,
            ToolKind::GitDiff => self.git_diff(input).await,
            ToolKind::GitBlame => self.git_blame(input).await,
            ToolKind::ReadTable => self.read_table(input).await,
            ToolKind::ReadExecutionLog => self.read_execution_log(input, ctx).await,
            ToolKind::GetSchema => self.get_schema().await,
            ToolKind::SearchKnowledgeBase => self.knowledge(input, "knowledge").await,
            ToolKind::SearchLessons => self.knowledge(input, "lessons").await,
            ToolKind::RecallMemory => self.knowledge(input, "memory").await,
            ToolKind::QueryOntology => self.knowledge(input, "ontology").await,
            ToolKind::QueryObjectLinks => self.knowledge(input, "object_links").await,
            ToolKind::QueryPipelineStatus => self.pipeline_status().await,
            ToolKind::WebFetch => self.web_fetch(input).await,
            ToolKind::CheckClarification => self.check_clarification(ctx).await,
            ToolKind::CheckChildStatus => self.handle_check_child_status(input, ctx).await,
            other => fail(ToolError::invalid_input(format!("not a read tool: {other:?}"))),
        }
    }

    fn git_ref_or_default<'a>(&'a self, git_ref: &'a Option<String>) -> &'a str {
        git_ref.as_deref().unwrap_or(&self.config.default_branch)
    }

    async fn read_file(&self, input: &Value, full: bool) -> HandlerOutput {
        let parsed: PathInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let git_ref = self.git_ref_or_default(&parsed.git_ref);
        let result = if full {
            // Tree + blob API: no truncation.
            self.git.read_full(&parsed.path, git_ref).await
        } else {
            self.git.read_raw(&parsed.path, git_ref).await
        };
        match result {
            Ok(content) => {
                let clipped =
                    if full { content.as_str() } else { clip(&content, CONTENTS_READ_MAX) };
                let truncated = clipped.len() < content.len();
                ok(json!({ "path": parsed.path, "content": clipped, "truncated": truncated }))
            }
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn read_file_range(&self, input: &Value) -> HandlerOutput {
        let parsed: RangeInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        if parsed.start_line == 0 || parsed.end_line < parsed.start_line {
            return fail(ToolError::invalid_input("line range must be 1-based and ordered"));
        }
        let git_ref = self.git_ref_or_default(&parsed.git_ref);
        match self.git.read_full(&parsed.path, git_ref).await {
            Ok(content) => {
                let slice: Vec<&str> = content
                    .lines()
                    .skip(parsed.start_line - 1)
                    .take(parsed.end_line - parsed.start_line + 1)
                    .collect();
                ok(json!({
                    "path": parsed.path,
                    "start_line": parsed.start_line,
                    "end_line": parsed.end_line,
                    "content": slice.join("\n"),
                }))
            }
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn list_files(&self, input: &Value) -> HandlerOutput {
        let parsed: ListInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let git_ref = self.git_ref_or_default(&parsed.git_ref);
        match self.git.list_dir(parsed.path.as_deref().unwrap_or(""), git_ref).await {
            Ok(entries) => {
                let rows: Vec<Value> = entries
                    .iter()
                    .map(|e| json!({ "path": e.path, "type": e.kind, "size": e.size }))
                    .collect();
                ok(Value::Array(rows))
            }
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn search_code(&self, input: &Value) -> HandlerOutput {
        let parsed: QueryInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.git.search_code(&parsed.query).await {
            Ok(results) => ok(results),
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    /// Working-tree grep through the sandbox (whitelisted command).
    async fn grep(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: GrepInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let mut args = vec!["-rn".to_string(), parsed.pattern.clone()];
        args.push(parsed.path.unwrap_or_else(|| ".".to_string()));
        if let Err(e) = check_arg_safety(&args) {
            return fail(e);
        }
        self.ensure_pulled(ctx).await;
        let request = ExecRequest {
            command: "grep".into(),
            args,
            timeout_ms: 30_000,
            wo_slug: ctx.wo_slug.clone(),
        };
        match self.sandbox.exec(&request).await {
            Ok(result) => ok(json!({
                "matches": result.stdout,
                "exit_code": result.exit_code,
            })),
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn tree(&self, input: &Value) -> HandlerOutput {
        let parsed: TreeInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let git_ref = self.git_ref_or_default(&parsed.git_ref);
        match self.git.tree_paths(git_ref, parsed.recursive.unwrap_or(true)).await {
            Ok(paths) => ok(json!(paths)),
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn git_log(&self, input: &Value) -> HandlerOutput {
        let parsed: LogInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.git.log(parsed.path.as_deref(), parsed.limit.unwrap_or(20)).await {
            Ok(commits) => {
                let rows: Vec<Value> = commits
                    .iter()
                    .map(|c| {
                        json!({
                            "sha": c.sha,
                            "message": c.message,
                            "author": c.author,
                            "date": c.date,
                        })
                    })
                    .collect();
                ok(Value::Array(rows))
            }
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn git_diff(&self, input: &Value) -> HandlerOutput {
        let parsed: DiffInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.git.diff(&parsed.base, &parsed.head).await {
            Ok(diff) => ok(Value::String(diff)),
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn git_blame(&self, input: &Value) -> HandlerOutput {
        let parsed: PathInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let git_ref = self.git_ref_or_default(&parsed.git_ref).to_string();
        match self.git.blame(&parsed.path, &git_ref).await {
            Ok(blame) => ok(blame),
            Err(e) => fail(ToolError::new(e.error_class(), e.to_string())),
        }
    }

    async fn read_table(&self, input: &Value) -> HandlerOutput {
        let parsed: TableInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.store.read_table(&parsed.table, parsed.limit.unwrap_or(100)).await {
            Ok(rows) => ok(rows),
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn read_execution_log(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: ExecutionLogInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.store.execution_log(&ctx.wo_id).await {
            Ok(mut entries) => {
                if let Some(limit) = parsed.limit {
                    let start = entries.len().saturating_sub(limit);
                    entries = entries.split_off(start);
                }
                match serde_json::to_value(entries) {
                    Ok(data) => ok(data),
                    Err(e) => fail(ToolError::external(e.to_string())),
                }
            }
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn get_schema(&self) -> HandlerOutput {
        match self.store.get_schema().await {
            Ok(schema) => ok(schema),
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn knowledge(&self, input: &Value, kind: &str) -> HandlerOutput {
        let parsed: QueryInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        match self.store.knowledge_query(kind, &parsed.query).await {
            Ok(results) => ok(results),
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn pipeline_status(&self) -> HandlerOutput {
        match self.store.knowledge_query("pipeline_status", "").await {
            Ok(status) => ok(status),
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn web_fetch(&self, input: &Value) -> HandlerOutput {
        let parsed: FetchInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return fail(e),
        };
        let response = match self.web.get(&parsed.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return fail(ToolError::timeout(format!("web_fetch timed out: {e}")))
            }
            Err(e) => return fail(ToolError::external(e.to_string())),
        };
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                let clipped = clip(&body, WEB_FETCH_MAX);
                ok(json!({
                    "url": parsed.url,
                    "status": status,
                    "body": clipped,
                    "truncated": clipped.len() < body.len(),
                }))
            }
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }

    async fn check_clarification(&self, ctx: &ToolCtx) -> HandlerOutput {
        match self.store.pending_clarification(&ctx.wo_id).await {
            Ok(Some(request)) => ok(json!({
                "status": "pending",
                "clarification_id": request.id,
                "question": request.question,
            })),
            Ok(None) => ok(json!({ "status": "none" })),
            Err(e) => fail(ToolError::external(e.to_string())),
        }
    }
}
