// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic multi-file commit with pre-commit validation, post-commit
//! verification, and anti-clobber advisories.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, LedgerFacts, ToolCtx};
use fm_adapters::{ExecRequest, GitHost as _, GitHostError, Sandbox as _, TreeEntry};
use fm_core::{Clock, MutationRecord, ProxyMode, ToolError, ToolResult, WoStatus};
use fm_storage::{result_hash, Store as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Extensions subject to corruption/size validation.
const CODE_EXTENSIONS: [&str; 5] = ["ts", "js", "json", "tsx", "jsx"];
/// Max high-bit characters tolerated in a code file.
const NON_ASCII_MAX: usize = 10;
/// Consecutive C3 8x/9x pairs that flag double-encoded UTF-8.
const MULTI_ENCODE_RUNS: usize = 4;
/// Byte-length mismatch tolerated by post-commit verification.
const VERIFY_TOLERANCE_PCT: f64 = 5.0;

#[derive(Debug, Deserialize)]
struct PushFilesInput {
    files: Vec<PushFile>,
    message: String,
    branch: String,
}

#[derive(Debug, Deserialize)]
struct PushFile {
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    patches: Option<Vec<PatchOp>>,
}

#[derive(Debug, Deserialize)]
struct PatchOp {
    search: String,
    replace: String,
}

fn is_code_file(path: &str) -> bool {
    path.rsplit('.').next().is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
}

/// Count characters in the 0x80..=0xFF byte range.
fn high_byte_count(content: &str) -> usize {
    content.bytes().filter(|b| *b >= 0x80).count()
}

/// Detect 4+ consecutive two-byte C3 8x/C3 9x sequences: the classic
/// double-encoded UTF-8 signature.
fn has_multi_encode_signature(content: &str) -> bool {
    let bytes = content.as_bytes();
    let mut run = 0usize;
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == 0xC3 && (0x80..=0x9F).contains(&bytes[i + 1]) {
            run += 1;
            if run >= MULTI_ENCODE_RUNS {
                return true;
            }
            i += 2;
        } else {
            run = 0;
            i += 1;
        }
    }
    false
}

/// Apply ordered search/replace patches. Each search must match exactly
/// once in the text as it stands after the prior patches.
fn apply_patches(path: &str, original: &str, patches: &[PatchOp]) -> Result<String, ToolError> {
    let mut text = original.to_string();
    for (idx, patch) in patches.iter().enumerate() {
        let count = text.matches(&patch.search).count();
        if count == 0 {
            return Err(ToolError::invalid_input(format!(
                "patch {idx} for {path}: search string not found"
            )));
        }
        if count > 1 {
            return Err(ToolError::invalid_input(format!(
                "patch {idx} for {path}: search string matches {count} times; must be unique"
            )));
        }
        text = text.replacen(&patch.search, &patch.replace, 1);
    }
    Ok(text)
}

fn validate_content(path: &str, content: &str, original_len: Option<usize>) -> Result<(), ToolError> {
    if !is_code_file(path) {
        return Ok(());
    }
    if has_multi_encode_signature(content) {
        return Err(ToolError::invalid_input(format!(
            "UTF-8 corruption detected in {path}: double-encoded byte sequences"
        )));
    }
    let high = high_byte_count(content);
    if high > NON_ASCII_MAX {
        return Err(ToolError::invalid_input(format!(
            "non-ASCII corruption suspected in {path}: {high} high-bit characters"
        )));
    }
    if let Some(original_len) = original_len {
        if original_len > 0 && content.len() > 2 * original_len {
            return Err(ToolError::invalid_input(format!(
                "size explosion in {path}: {} bytes vs {original_len} original",
                content.len()
            )));
        }
    }
    Ok(())
}

struct ResolvedFile {
    path: String,
    content: String,
    explicit_content: bool,
}

impl<C: Clock> Dispatcher<C> {
    pub(crate) async fn handle_push_files(&self, input: &Value, ctx: &ToolCtx) -> HandlerOutput {
        let parsed: PushFilesInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        if parsed.files.is_empty() {
            return HandlerOutput::fail(ToolError::invalid_input("files must not be empty"));
        }
        let paths: Vec<Value> =
            parsed.files.iter().map(|f| Value::String(f.path.clone())).collect();
        let first_path = parsed.files[0].path.clone();
        let base_facts = || {
            LedgerFacts::new("repository", first_path.clone(), "PUSH")
                .with("branch", Value::String(parsed.branch.clone()))
                .with("message", Value::String(parsed.message.clone()))
                .with("paths", Value::Array(paths.clone()))
        };

        match self.push_files_inner(&parsed, ctx).await {
            Ok((commit_sha, resolved, warning)) => {
                self.verify_committed_bytes(&parsed.branch, &commit_sha, &resolved, ctx).await;
                let mut message = format!(
                    "Committed {} file(s) to {} @ {}",
                    resolved.len(),
                    parsed.branch,
                    commit_sha
                );
                if let Some(warning) = &warning {
                    message = format!("{warning}\n{message}");
                }
                let mut data = Map::new();
                data.insert("message".into(), Value::String(message));
                data.insert("commit_sha".into(), Value::String(commit_sha.clone()));
                data.insert("branch".into(), Value::String(parsed.branch.clone()));
                data.insert("paths".into(), Value::Array(paths.clone()));
                if let Some(warning) = warning {
                    data.insert("warning".into(), Value::String(warning));
                }
                HandlerOutput::ok_recorded(
                    ToolResult::ok(Value::Object(data)),
                    base_facts().with("commit", Value::String(commit_sha)),
                )
            }
            Err(e) => HandlerOutput::fail_recorded(e, base_facts()),
        }
    }

    /// The five-step Git Data API pipeline. Atomic: nothing is observable
    /// on the branch until the final ref update.
    async fn push_files_inner(
        &self,
        input: &PushFilesInput,
        ctx: &ToolCtx,
    ) -> Result<(String, Vec<ResolvedFile>, Option<String>), ToolError> {
        let head = self
            .git
            .branch_head(&input.branch)
            .await
            .map_err(git_error)?;

        // Resolve content and validate everything before creating objects.
        let mut resolved = Vec::with_capacity(input.files.len());
        for file in &input.files {
            let original = match self.git.read_raw(&file.path, &head.commit_sha).await {
                Ok(text) => Some(text),
                Err(GitHostError::PathNotFound(_)) => None,
                Err(e) => return Err(git_error(e)),
            };
            let (content, explicit) = match (&file.content, &file.patches) {
                (Some(content), _) => (content.clone(), true),
                (None, Some(patches)) => {
                    let base = original.as_deref().ok_or_else(|| {
                        ToolError::invalid_input(format!(
                            "patch mode requires an existing file: {}",
                            file.path
                        ))
                    })?;
                    (apply_patches(&file.path, base, patches)?, false)
                }
                (None, None) => {
                    return Err(ToolError::invalid_input(format!(
                        "file {} needs either content or patches",
                        file.path
                    )))
                }
            };
            validate_content(&file.path, &content, original.as_ref().map(String::len))?;
            resolved.push(ResolvedFile { path: file.path.clone(), content, explicit_content: explicit });
        }

        let warning = self.anti_clobber_warning(&resolved, ctx).await;

        let mut entries = Vec::with_capacity(resolved.len());
        for file in &resolved {
            let blob_sha = self.git.create_blob(&file.content).await.map_err(git_error)?;
            entries.push(TreeEntry { path: file.path.clone(), blob_sha });
        }
        let tree_sha =
            self.git.create_tree(&head.tree_sha, &entries).await.map_err(git_error)?;
        let commit_sha = self
            .git
            .create_commit(&input.message, &tree_sha, &head.commit_sha)
            .await
            .map_err(git_error)?;
        self.git.update_ref(&input.branch, &commit_sha).await.map_err(|e| match e {
            GitHostError::NonFastForward(branch) => ToolError::external(format!(
                "non-fast-forward update of {branch}: another commit landed first; retry the push"
            )),
            other => git_error(other),
        })?;

        Ok((commit_sha, resolved, warning))
    }

    /// Advisory only: list recently-completed WOs that touched these paths.
    async fn anti_clobber_warning(
        &self,
        resolved: &[ResolvedFile],
        ctx: &ToolCtx,
    ) -> Option<String> {
        let mut conflicts: Vec<String> = Vec::new();
        for file in resolved {
            let touches = match self
                .store
                .mutations_touching(&file.path, self.config.anti_clobber_window_ms)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(path = %file.path, error = %e, "anti-clobber scan failed");
                    continue;
                }
            };
            for record in touches {
                if record.work_order_id == ctx.wo_id
                    || record.action != "PUSH"
                    || !record.success
                {
                    continue;
                }
                let Ok(Some(wo)) = self.store.work_order(&record.work_order_id).await else {
                    continue;
                };
                if wo.status != WoStatus::Done {
                    continue;
                }
                let commit = record
                    .context
                    .get("commit")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                let entry = format!("{}@{}", wo.slug, commit);
                if !conflicts.contains(&entry) {
                    conflicts.push(entry);
                }
            }
        }
        if conflicts.is_empty() {
            None
        } else {
            Some(format!(
                "WARNING: recently completed WO(s) touched these paths: {}",
                conflicts.join(", ")
            ))
        }
    }

    /// Post-commit verification: `wc -c` in the working tree vs expected
    /// byte length, recorded as a separate ledger row per explicit file.
    async fn verify_committed_bytes(
        &self,
        branch: &str,
        commit_sha: &str,
        resolved: &[ResolvedFile],
        ctx: &ToolCtx,
    ) {
        let explicit: Vec<&ResolvedFile> =
            resolved.iter().filter(|f| f.explicit_content).collect();
        if explicit.is_empty() {
            return;
        }
        if let Err(e) = self.sandbox.git_pull(&ctx.wo_slug).await {
            tracing::warn!(error = %e, "working-tree refresh before byte verification failed");
        } else {
            self.pulled.lock().insert(ctx.wo_id);
        }

        for file in explicit {
            let expected = file.content.len() as u64;
            let request = ExecRequest {
                command: "wc".into(),
                args: vec!["-c".into(), file.path.clone()],
                timeout_ms: 30_000,
                wo_slug: ctx.wo_slug.clone(),
            };
            let (actual, verified, error) = match self.sandbox.exec(&request).await {
                Ok(result) => {
                    let actual = result
                        .stdout
                        .split_whitespace()
                        .next()
                        .and_then(|n| n.parse::<u64>().ok());
                    match actual {
                        Some(actual) => {
                            let drift = actual.abs_diff(expected) as f64;
                            let pct = if expected == 0 {
                                if actual == 0 { 0.0 } else { 100.0 }
                            } else {
                                drift * 100.0 / expected as f64
                            };
                            let ok = pct <= VERIFY_TOLERANCE_PCT;
                            if !ok {
                                tracing::warn!(
                                    path = %file.path,
                                    expected,
                                    actual,
                                    "post-commit byte count drifted beyond tolerance"
                                );
                            }
                            (Some(actual), ok, None)
                        }
                        None => (None, false, Some(format!("unparseable wc output: {}", result.stdout))),
                    }
                }
                Err(e) => (None, false, Some(e.to_string())),
            };

            let mut record = MutationRecord {
                work_order_id: ctx.wo_id,
                tool_name: "github_push_files".into(),
                object_type: "repository".into(),
                object_id: file.path.clone(),
                action: "VERIFY".into(),
                success: true,
                verified: Some(verified),
                error_class: None,
                error_detail: error,
                context: Map::new(),
                result_hash: None,
                proxy_mode: ProxyMode::SelfReport,
                actor: ctx.actor.name.clone(),
                created_at: self.clock.epoch_ms(),
            };
            record.context.insert("branch".into(), Value::String(branch.to_string()));
            record.context.insert("commit".into(), Value::String(commit_sha.to_string()));
            record.context.insert("expected_bytes".into(), json!(expected));
            if let Some(actual) = actual {
                record.context.insert("actual_bytes".into(), json!(actual));
            }
            record.result_hash =
                Some(result_hash(&format!("{expected}:{}", actual.unwrap_or(0))));
            let _ = self.ledger.record(record).await;
        }
    }
}

fn git_error(e: GitHostError) -> ToolError {
    ToolError::new(e.error_class(), e.to_string())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
