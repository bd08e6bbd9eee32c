// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Fixture;
use fm_core::WoStatus;
use fm_storage::Store;
use serde_json::json;

#[tokio::test]
async fn delegation_creates_running_child_with_inherited_tags() {
    let fx = Fixture::new();
    let parent = fx.seed_wo("p", &["foo", "bar"]);

    let result = fx
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({
                "name": "split",
                "objective": "do half the work",
                "acceptance_criteria": "1. x\n2. y",
                "model_tier": "sonnet",
            }),
            &fx.ctx(&parent),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    // Non-blocking: the parent gets the slug immediately.
    assert!(!result.terminal);

    let data = result.data.unwrap();
    let child_slug = data.get("child_slug").and_then(Value::as_str).unwrap();
    let child = fx.store.work_order_by_slug(child_slug).await.unwrap().unwrap();

    assert_eq!(child.status, WoStatus::InProgress);
    assert_eq!(child.parent_id, Some(parent.id));
    let expected: std::collections::BTreeSet<String> =
        ["foo".to_string(), "bar".to_string(), "parent:p".to_string()].into();
    assert_eq!(child.tags, expected);
    assert_eq!(child.client_info_str("model"), Some("claude-sonnet-4-5-20250929"));
    assert_eq!(
        child.acceptance_criteria,
        vec!["1. x".to_string(), "2. y".to_string()]
    );
}

#[tokio::test]
async fn operational_tags_are_not_inherited() {
    let fx = Fixture::new();
    let parent = fx.seed_wo("p", &["foo", "remediation", "auto-qa-loop", "parent:older"]);

    let result = fx
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({ "name": "n", "objective": "o", "acceptance_criteria": "1. z" }),
            &fx.ctx(&parent),
        )
        .await;
    let data = result.data.unwrap();
    let child_slug = data.get("child_slug").and_then(Value::as_str).unwrap();
    let child = fx.store.work_order_by_slug(child_slug).await.unwrap().unwrap();

    let expected: std::collections::BTreeSet<String> =
        ["foo".to_string(), "parent:p".to_string()].into();
    assert_eq!(child.tags, expected);
}

#[tokio::test]
async fn default_tier_is_sonnet_and_bad_tiers_are_rejected() {
    let fx = Fixture::new();
    let parent = fx.seed_wo("p", &[]);

    let result = fx
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({ "name": "a", "objective": "o", "acceptance_criteria": "1. z" }),
            &fx.ctx(&parent),
        )
        .await;
    let data = result.data.unwrap();
    assert_eq!(data.get("model"), Some(&json!("claude-sonnet-4-5-20250929")));

    let result = fx
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({
                "name": "b",
                "objective": "o",
                "acceptance_criteria": "1. z",
                "model_tier": "gpt4",
            }),
            &fx.ctx(&parent),
        )
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("model_tier")));
}

#[tokio::test]
async fn context_injection_lands_on_the_tree_root() {
    let fx = Fixture::new();
    let root = fx.seed_wo("root", &[]);
    let mut mid = fx.seed_wo("mid", &[]);
    mid.parent_id = Some(root.id);
    fx.store.seed_work_order(mid.clone());

    fx.dispatcher
        .dispatch(
            "delegate_subtask",
            json!({
                "name": "leaf",
                "objective": "o",
                "acceptance_criteria": "1. z",
                "context_injection": "schema v2 is authoritative",
            }),
            &fx.ctx(&mid),
        )
        .await;

    let contexts = fx.store.context_rows();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].root_wo_id, root.id);
    assert_eq!(contexts[0].content, "schema v2 is authoritative");
}

#[tokio::test]
async fn check_child_status_reports_terminality() {
    let fx = Fixture::new();
    let parent = fx.seed_wo("p", &[]);
    let result = fx
        .dispatcher
        .dispatch(
            "delegate_subtask",
            json!({ "name": "kid", "objective": "o", "acceptance_criteria": "1. z" }),
            &fx.ctx(&parent),
        )
        .await;
    let child_slug = result
        .data
        .unwrap()
        .get("child_slug")
        .and_then(Value::as_str)
        .unwrap()
        .to_string();

    let status = fx
        .dispatcher
        .dispatch("check_child_status", json!({ "child_slug": child_slug }), &fx.ctx(&parent))
        .await;
    let data = status.data.unwrap();
    assert_eq!(data.get("terminal"), Some(&json!(false)));
    assert_eq!(data.get("status"), Some(&json!("in_progress")));

    let child = fx.store.work_order_by_slug(&child_slug).await.unwrap().unwrap();
    fx.store
        .wo_transition(&child.id, fm_core::WoEvent::MarkFailed, "x", &json!({"reason":"r"}))
        .await
        .unwrap();
    let status = fx
        .dispatcher
        .dispatch("check_child_status", json!({ "child_slug": child_slug }), &fx.ctx(&parent))
        .await;
    assert_eq!(status.data.unwrap().get("terminal"), Some(&json!(true)));
}
