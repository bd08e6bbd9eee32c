// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The six end-to-end scenarios, run literally.

use crate::prelude::Runtime;
use fm_core::{Phase, WoStatus};
use fm_storage::Store;
use serde_json::{json, Value};

/// Scenario 1: happy-path edit. One file committed, ref advanced, one PUSH
/// ledger row and one byte-verification row.
#[tokio::test]
async fn happy_path_edit() {
    let rt = Runtime::new();
    let c0 = rt.git.seed_branch("main", &[(".keep", "")]);
    rt.sandbox.set_file_size("README.md", 6);
    let wo = rt.seed_wo("init-readme", &[]);

    let result = rt
        .dispatcher
        .dispatch(
            "github_push_files",
            json!({
                "files": [{ "path": "README.md", "content": "Hello\n" }],
                "message": "init",
                "branch": "main",
            }),
            &rt.ctx(&wo),
        )
        .await;
    assert!(result.success, "{:?}", result.error);

    let head = rt.git.head_of("main").expect("branch exists");
    assert_ne!(head, c0, "ref must advance to the new commit");
    assert_eq!(rt.git.file_at_head("main", "README.md").as_deref(), Some("Hello\n"));

    let rows = rt.store.mutation_rows();
    assert_eq!(rows.len(), 2);
    let push = rows.iter().find(|r| r.action == "PUSH").expect("push row");
    assert_eq!(push.tool_name, "github_push_files");
    assert_eq!(push.object_id, "README.md");
    assert!(push.success);
    let verify = rows.iter().find(|r| r.action == "VERIFY").expect("verify row");
    assert_eq!(verify.verified, Some(true));
    assert_eq!(verify.context.get("expected_bytes"), Some(&json!(6)));
    assert_eq!(verify.context.get("actual_bytes"), Some(&json!(6)));
}

/// Scenario 2: UTF-8 corruption rejected. Branch untouched, failed ledger
/// row classified invalid_input.
#[tokio::test]
async fn utf8_corruption_rejected() {
    let rt = Runtime::new();
    let c0 = rt.git.seed_branch("main", &[(".keep", "")]);
    let wo = rt.seed_wo("corrupt-push", &[]);

    // Four consecutive C3 82 byte pairs.
    let corrupted = "\u{c2}".repeat(4);
    let result = rt
        .dispatcher
        .dispatch(
            "github_push_files",
            json!({
                "files": [{ "path": "src/index.ts", "content": corrupted }],
                "message": "bad",
                "branch": "main",
            }),
            &rt.ctx(&wo),
        )
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("UTF-8 corruption detected")));
    assert_eq!(rt.git.head_of("main"), Some(c0), "branch ref unchanged");

    let rows = rt.store.mutation_rows();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].success);
    assert_eq!(rows[0].error_class, Some(fm_core::ErrorClass::InvalidInput));
}

/// Scenario 3: stuck redispatch. 12 minutes idle, retry counter 0, agent
/// endpoint answers 503: counter becomes 1, WO stays in_progress, one
/// retry_scheduled log entry.
#[tokio::test]
async fn stuck_redispatch() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("wedged-agent", &[]);
    rt.clock.advance(std::time::Duration::from_secs(12 * 60));
    rt.gateway.push_response(Ok(503));

    let report = rt.ops.run_health_check().await;

    assert_eq!(rt.gateway.calls(), vec!["wedged-agent".to_string()]);
    assert_eq!(report.stuck_wos.len(), 1);
    assert_eq!(report.stuck_wos[0].outcome, "retry_scheduled");

    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::InProgress);
    assert_eq!(updated.ops_retry_count(), 1);

    let retries: Vec<_> = rt
        .store
        .log_entries(&wo.id)
        .into_iter()
        .filter(|e| e.event_type() == Some("retry_scheduled"))
        .collect();
    assert_eq!(retries.len(), 1);
}

/// Scenario 4: failed transition detected. The RPC "succeeds" but the row
/// still shows in_progress: status_mismatch with an ERR_STATUS_MISMATCH
/// diagnostic, and nothing downstream changed.
#[tokio::test]
async fn failed_transition_detected() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("stale-row", &[]);
    rt.store.silently_reject_transitions(&wo.id);

    let result = rt
        .dispatcher
        .dispatch("transition_state", json!({ "new_status": "review" }), &rt.ctx(&wo))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Status transition failed: DB shows in_progress instead of review")
    );

    let diags = rt.store.error_event_rows();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, "ERR_STATUS_MISMATCH");

    // No journal row, no status change.
    assert!(rt.store.wo_event_rows().is_empty());
    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::InProgress);
}

/// Scenario 5: deployment verification gate. An edge-function-tagged WO
/// cannot complete without a deployment_verification log entry.
#[tokio::test]
async fn deployment_verification_gate() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("ship-fn", &["edge-function"]);

    let result = rt
        .dispatcher
        .dispatch("mark_complete", json!({ "summary": "done" }), &rt.ctx(&wo))
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("BLOCKED: WO has deployment-related tags")));

    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::InProgress);
}

/// Scenario 5b: deploying through the tool surface writes the gate entry,
/// after which completion goes through.
#[tokio::test]
async fn deployment_then_completion() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("ship-fn", &["edge-function"]);

    let result = rt
        .dispatcher
        .dispatch(
            "deploy_edge_function",
            json!({
                "function_name": "hello",
                "files": [{ "path": "index.ts", "content": "Deno.serve(() => new Response('ok'))" }],
            }),
            &rt.ctx(&wo),
        )
        .await;
    assert!(result.success, "{:?}", result.error);

    let log = rt.store.log_entries(&wo.id);
    assert!(log.iter().any(|e| e.phase == Phase::DeploymentVerification));

    let result = rt
        .dispatcher
        .dispatch("mark_complete", json!({ "summary": "shipped" }), &rt.ctx(&wo))
        .await;
    assert!(result.success, "{:?}", result.error);
    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::Done);
}

/// Scenario 6: delegation. Child inherits tags plus parent:<slug>, gets
/// the sonnet model, runs immediately, parent returns with the slug.
#[tokio::test]
async fn delegation() {
    let rt = Runtime::new();
    let parent = rt.seed_wo("p", &["foo", "bar"]);

    let result = rt
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({
                "name": "split",
                "objective": "handle the second half",
                "acceptance_criteria": "1. x\n2. y",
                "model_tier": "sonnet",
            }),
            &rt.ctx(&parent),
        )
        .await;
    assert!(result.success, "{:?}", result.error);

    let data = result.data.expect("delegation data");
    let child_slug = data.get("child_slug").and_then(Value::as_str).expect("child slug");
    let child = rt.store.work_order_by_slug(child_slug).await.unwrap().unwrap();

    let expected_tags: std::collections::BTreeSet<String> =
        ["foo".to_string(), "bar".to_string(), "parent:p".to_string()].into();
    assert_eq!(child.tags, expected_tags);
    assert_eq!(child.client_info_str("model"), Some("claude-sonnet-4-5-20250929"));
    assert_eq!(child.status, WoStatus::InProgress);
    assert_eq!(child.parent_id, Some(parent.id));
}
