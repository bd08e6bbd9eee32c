// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-component invariants exercised end-to-end.

use crate::prelude::Runtime;
use fm_core::{ProxyMode, ToolResult, WoStatus};
use fm_storage::Store;
use serde_json::json;

/// Every successful mutating dispatch yields exactly one ledger row —
/// self_report in-process, or edge_proxy via the proxy, never both.
#[tokio::test]
async fn one_ledger_row_per_mutating_dispatch() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("audited", &[]);

    rt.dispatcher
        .dispatch("sandbox_exec", json!({ "command": "echo", "args": ["a"] }), &rt.ctx(&wo))
        .await;
    rt.dispatcher
        .dispatch("execute_sql", json!({ "query": "INSERT INTO t VALUES (1)" }), &rt.ctx(&wo))
        .await;
    // A read adds nothing.
    rt.dispatcher
        .dispatch("execute_sql", json!({ "query": "SELECT 1" }), &rt.ctx(&wo))
        .await;

    let rows = rt.store.mutation_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.proxy_mode == ProxyMode::SelfReport));
}

/// Proxied calls are recorded server-side only: the in-process ledger must
/// stay silent when the proxy answers.
#[tokio::test]
async fn proxy_and_self_report_are_mutually_exclusive() {
    let (rt, proxy) = Runtime::with_proxy();
    let wo = rt.seed_wo("proxied", &[]);
    proxy.respond_for("execute_sql", ToolResult::ok_text("executed successfully"));

    let result = rt
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "INSERT INTO t VALUES (1)" }), &rt.ctx(&wo))
        .await;
    assert!(result.success);
    assert!(rt.store.mutation_rows().is_empty());
}

/// Every verified transition leaves a journal row whose new_status matches
/// the re-read WO.
#[tokio::test]
async fn journal_matches_row_after_every_transition() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("journaled", &[]);

    rt.dispatcher
        .dispatch("mark_complete", json!({ "summary": "all done" }), &rt.ctx(&wo))
        .await;

    let events = rt.store.wo_event_rows();
    assert!(!events.is_empty());
    let last = events.last().unwrap();
    let row = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(row.status, last.new_status);
    assert_eq!(row.status, WoStatus::Done);
}

/// Push atomicity: a validation failure mid-batch leaves the branch tip
/// untouched even when earlier files in the batch were valid.
#[tokio::test]
async fn push_failure_before_ref_update_changes_nothing() {
    let rt = Runtime::new();
    let c0 = rt.git.seed_branch("main", &[(".keep", "")]);
    let wo = rt.seed_wo("batch", &[]);

    let corrupted = "\u{c2}".repeat(4);
    let result = rt
        .dispatcher
        .dispatch(
            "github_push_files",
            json!({
                "files": [
                    { "path": "ok.txt", "content": "fine" },
                    { "path": "bad.ts", "content": corrupted },
                ],
                "message": "mixed",
                "branch": "main",
            }),
            &rt.ctx(&wo),
        )
        .await;
    assert!(!result.success);
    assert_eq!(rt.git.head_of("main"), Some(c0));
}

/// Sandbox policy: no command outside the whitelist, no arg with shell
/// metacharacters, ever reaches the sandbox.
#[tokio::test]
async fn sandbox_policy_is_airtight_at_the_dispatch_boundary() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("guarded", &[]);

    let attempts = [
        json!({ "command": "rm", "args": ["-rf", "/"] }),
        json!({ "command": "echo", "args": ["hi; rm -rf /"] }),
        json!({ "command": "cat", "args": ["$(secrets)"] }),
        json!({ "command": "grep", "args": ["`id`"] }),
    ];
    for input in attempts {
        let result = rt.dispatcher.dispatch("sandbox_exec", input, &rt.ctx(&wo)).await;
        assert!(!result.success);
    }
    assert!(rt.sandbox.calls().is_empty(), "nothing may reach the sandbox");
}

/// A failing tool result does not transition the WO; only explicit
/// mark_failed / the ops loop do.
#[tokio::test]
async fn tool_failures_do_not_change_status() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("resilient", &[]);

    for _ in 0..5 {
        let result = rt
            .dispatcher
            .dispatch("execute_sql", json!({ "query": "DROP TABLE t" }), &rt.ctx(&wo))
            .await;
        assert!(!result.success);
    }
    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::InProgress);
}

/// Ops redispatches at most three times; the fourth stuck observation
/// triggers exactly one mark_failed attempt.
#[tokio::test]
async fn redispatch_budget_is_three() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("limited", &[]);

    for round in 1..=3u64 {
        rt.clock.advance(std::time::Duration::from_secs(11 * 60));
        rt.gateway.push_response(Ok(503));
        let report = rt.ops.run_health_check().await;
        assert_eq!(report.stuck_wos[0].outcome, "retry_scheduled", "round {round}");
        let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
        assert_eq!(updated.ops_retry_count(), round);
    }
    assert_eq!(rt.gateway.calls().len(), 3);

    // Fourth observation: no more redispatch, one mark_failed.
    rt.clock.advance(std::time::Duration::from_secs(11 * 60));
    let report = rt.ops.run_health_check().await;
    assert_eq!(rt.gateway.calls().len(), 3, "no fourth redispatch");
    assert_eq!(report.marked_failed, vec!["limited".to_string()]);
    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::Failed);
}

/// Terminal WOs accept no further transitions through any path.
#[tokio::test]
async fn terminal_wos_are_immutable_in_status() {
    let rt = Runtime::new();
    let wo = rt.seed_wo("finished", &[]);
    rt.dispatcher
        .dispatch("mark_failed", json!({ "reason": "gone" }), &rt.ctx(&wo))
        .await;

    let result = rt
        .dispatcher
        .dispatch("transition_state", json!({ "new_status": "in_progress" }), &rt.ctx(&wo))
        .await;
    assert!(!result.success);

    let result = rt
        .dispatcher
        .dispatch("mark_complete", json!({ "summary": "resurrect" }), &rt.ctx(&wo))
        .await;
    assert!(!result.success);

    let updated = rt.store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::Failed);
}
