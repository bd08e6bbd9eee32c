// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Fixture;
use fm_core::{ActorRole, ProxyMode};
use serde_json::json;

#[tokio::test]
async fn unknown_tool_is_an_error() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx.dispatcher.dispatch("rm_rf", json!({}), &fx.ctx(&wo)).await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("unknown tool")));
}

#[tokio::test]
async fn mutating_success_writes_exactly_one_self_report_row() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch("sandbox_exec", json!({ "command": "echo", "args": ["hi"] }), &fx.ctx(&wo))
        .await;
    assert!(result.success);

    let rows = fx.store.mutation_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tool_name, "sandbox_exec");
    assert_eq!(rows[0].proxy_mode, ProxyMode::SelfReport);
    assert!(rows[0].result_hash.is_some());
}

#[tokio::test]
async fn read_only_tools_are_never_recorded() {
    let fx = Fixture::new();
    fx.git.seed_branch("main", &[("README.md", "hi\n")]);
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch("github_read_file", json!({ "path": "README.md" }), &fx.ctx(&wo))
        .await;
    assert!(result.success);
    assert!(fx.store.mutation_rows().is_empty());
}

#[tokio::test]
async fn select_execute_sql_is_classified_as_a_read_and_not_recorded() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "SELECT * FROM t" }), &fx.ctx(&wo))
        .await;
    assert!(result.success);
    assert!(fx.store.mutation_rows().is_empty());
}

#[tokio::test]
async fn dml_execute_sql_is_recorded() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "INSERT INTO t VALUES (1)" }), &fx.ctx(&wo))
        .await;
    assert!(result.success);
    assert_eq!(result.data, Some(json!("executed successfully")));

    let rows = fx.store.mutation_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "DML");
    assert_eq!(rows[0].object_type, "database");
}

#[tokio::test]
async fn permission_deny_short_circuits_and_records() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    fx.store.set_permission("builder", "sandbox_exec", fm_core::Permission::Deny);

    let result = fx
        .dispatcher
        .dispatch("sandbox_exec", json!({ "command": "echo" }), &fx.ctx(&wo))
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("permission denied")));
    // The handler never ran.
    assert!(fx.sandbox.calls().is_empty());

    let rows = fx.store.mutation_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "DENIED");
    assert_eq!(rows[0].error_class, Some(fm_core::ErrorClass::PermissionDenied));
}

#[tokio::test]
async fn unspecified_permission_fails_open() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    // No permission row at all: the call goes through.
    let result = fx
        .dispatcher
        .dispatch("sandbox_exec", json!({ "command": "echo" }), &fx.ctx(&wo))
        .await;
    assert!(result.success);
}

#[tokio::test]
async fn read_only_actor_rejected_for_non_sql_mutations() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let ctx = fx.ctx_as(&wo, Actor::new("viewer", ActorRole::ReadOnly));

    let result =
        fx.dispatcher.dispatch("sandbox_exec", json!({ "command": "echo" }), &ctx).await;
    assert!(!result.success);

    // SELECT through execute_sql is still allowed.
    let result =
        fx.dispatcher.dispatch("execute_sql", json!({ "query": "SELECT 1" }), &ctx).await;
    assert!(result.success);

    // Write keywords are rejected by the SQL handler.
    let result = fx
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "UPDATE t SET a = 1" }), &ctx)
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn proxy_result_suppresses_in_process_recording() {
    let (fx, proxy) = Fixture::with_proxy();
    let wo = fx.seed_wo("wo-a", &[]);
    proxy.respond_for("github_push_files", ToolResult::ok_text("proxied"));

    let result = fx
        .dispatcher
        .dispatch(
            "github_push_files",
            json!({ "files": [{ "path": "a.txt", "content": "x" }], "message": "m", "branch": "main" }),
            &fx.ctx(&wo),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.data, Some(json!("proxied")));
    // The proxy records server-side with proxy_mode=edge_proxy; no
    // self_report row may exist.
    assert!(fx.store.mutation_rows().is_empty());
    assert_eq!(proxy.calls(), vec!["github_push_files".to_string()]);
}

#[tokio::test]
async fn proxy_decline_falls_through_to_in_process() {
    let (fx, proxy) = Fixture::with_proxy();
    fx.git.seed_branch("main", &[("a.txt", "old")]);
    let wo = fx.seed_wo("wo-a", &[]);
    // No canned response for the tool: proxy declines.

    let result = fx
        .dispatcher
        .dispatch(
            "github_push_files",
            json!({ "files": [{ "path": "a.txt", "content": "new" }], "message": "m", "branch": "main" }),
            &fx.ctx(&wo),
        )
        .await;
    assert!(result.success);
    assert_eq!(proxy.calls(), vec!["github_push_files".to_string()]);
    assert!(!fx.store.mutation_rows().is_empty());
}

#[tokio::test]
async fn destructive_sql_is_rejected_with_guidance() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "DROP TABLE audit" }), &fx.ctx(&wo))
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("apply_migration")));

    let rows = fx.store.mutation_rows();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].success);
}

#[tokio::test]
async fn bypass_sql_rejected_for_standard_actor() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let result = fx
        .dispatcher
        .dispatch(
            "execute_sql",
            json!({ "query": "SELECT SET_CONFIG('app.wo_executor_bypass','on',false)" }),
            &fx.ctx(&wo),
        )
        .await;
    assert!(!result.success);
    let rows = fx.store.mutation_rows();
    assert_eq!(rows[0].error_class, Some(fm_core::ErrorClass::PermissionDenied));
}

#[tokio::test]
async fn master_actor_may_set_session_config() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let ctx = fx.ctx_as(&wo, Actor::master("root"));
    let result = fx
        .dispatcher
        .dispatch("execute_sql", json!({ "query": "SET app.maintenance = 'on'" }), &ctx)
        .await;
    assert!(result.success);
    let history = fx.store.sql_history();
    assert_eq!(history[0].0, "config");
}

#[tokio::test]
async fn migration_lock_contention_is_retryable_not_fatal() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    let key = crate::handlers::sql::migration_lock_key("add_users");
    fx.store.hold_ddl_lock(key);

    let result = fx
        .dispatcher
        .dispatch(
            "apply_migration",
            json!({ "name": "add_users", "query": "CREATE TABLE users (id int)" }),
            &fx.ctx(&wo),
        )
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("could not obtain lock")));

    let rows = fx.store.mutation_rows();
    assert_eq!(rows[0].error_class, Some(fm_core::ErrorClass::LockContention));
}

#[tokio::test]
async fn every_dispatch_narrates_into_the_execution_log() {
    let fx = Fixture::new();
    let wo = fx.seed_wo("wo-a", &[]);
    fx.dispatcher
        .dispatch("execute_sql", json!({ "query": "SELECT 1" }), &fx.ctx(&wo))
        .await;
    fx.dispatcher
        .dispatch("sandbox_exec", json!({ "command": "echo" }), &fx.ctx(&wo))
        .await;

    let log = fx.store.log_entries(&wo.id);
    let accesses: Vec<&str> = log
        .iter()
        .filter(|e| e.event_type() == Some("tool_call"))
        .filter_map(|e| e.detail.get("access").and_then(serde_json::Value::as_str))
        .collect();
    assert_eq!(accesses, vec!["read", "write"]);
}
