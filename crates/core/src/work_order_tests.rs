// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::qa::{QaItem, QaStatus};
use serde_json::json;
use yare::parameterized;

#[test]
fn builder_defaults_are_in_progress() {
    let wo = WorkOrder::builder().build();
    assert_eq!(wo.status, WoStatus::InProgress);
    assert!(!wo.is_terminal());
    assert_eq!(wo.assigned_actor, "builder");
}

#[parameterized(
    done = { WoStatus::Done },
    cancelled = { WoStatus::Cancelled },
    failed = { WoStatus::Failed },
)]
fn terminal_statuses(status: WoStatus) {
    let wo = WorkOrder::builder().status(status).build();
    assert!(wo.is_terminal());
}

#[test]
fn deployment_tag_detection() {
    let wo = WorkOrder::builder().tags(["edge-function".to_string()].into()).build();
    assert!(wo.has_deployment_tag());
    let wo = WorkOrder::builder().tags(["frontend".to_string()].into()).build();
    assert!(!wo.has_deployment_tag());
}

#[test]
fn parent_tag_extraction() {
    let wo = WorkOrder::builder()
        .tags(["foo".to_string(), "parent:root-wo".to_string()].into())
        .build();
    assert_eq!(wo.parent_tag(), Some("root-wo"));
}

#[test]
fn inheritable_tags_strip_operational_markers() {
    let wo = WorkOrder::builder()
        .tags(
            [
                "foo".to_string(),
                "bar".to_string(),
                "remediation".to_string(),
                "auto-qa-loop".to_string(),
                "parent:other".to_string(),
            ]
            .into(),
        )
        .build();
    let inherited = wo.inheritable_tags();
    assert_eq!(inherited, ["bar".to_string(), "foo".to_string()].into());
}

#[test]
fn overlap_tags_exclude_operational_tokens() {
    let wo = WorkOrder::builder()
        .tags(
            [
                "checkout".to_string(),
                "deploy".to_string(),
                "schema".to_string(),
                "parent:x".to_string(),
            ]
            .into(),
        )
        .build();
    assert_eq!(wo.overlap_tags(), ["checkout".to_string()].into());
}

#[test]
fn qa_fail_count_counts_only_fails() {
    let wo = WorkOrder::builder()
        .qa_checklist(vec![
            QaItem { id: "1".into(), criterion: "a".into(), status: QaStatus::Pass, evidence: None },
            QaItem { id: "2".into(), criterion: "b".into(), status: QaStatus::Fail, evidence: None },
            QaItem { id: "3".into(), criterion: "c".into(), status: QaStatus::Pending, evidence: None },
        ])
        .build();
    assert_eq!(wo.qa_fail_count(), 1);
}

#[test]
fn client_info_counters_default_to_zero() {
    let wo = WorkOrder::builder().build();
    assert_eq!(wo.ops_retry_count(), 0);

    let mut info = serde_json::Map::new();
    info.insert("ops_retry_count".into(), json!(2));
    let wo = WorkOrder::builder().client_info(info).build();
    assert_eq!(wo.ops_retry_count(), 2);
}

#[test]
fn circuit_breaker_key_is_scoped_by_id() {
    let mut info = serde_json::Map::new();
    info.insert("ops_failure_attempt_wko-test1".into(), json!(3));
    let wo = WorkOrder::builder().client_info(info).build();
    assert_eq!(wo.ops_failure_attempts(), 3);
}

#[parameterized(
    simple = { "Fix checkout flow", "fix-checkout-flow" },
    punctuation = { "Add: v2 (beta)!", "add-v2-beta" },
    unicode_dropped = { "café menu", "caf-menu" },
    empty = { "???", "wo" },
)]
fn slugify_cases(name: &str, expected: &str) {
    assert_eq!(slugify(name), expected);
}

#[test]
fn work_order_serde_round_trips() {
    let wo = WorkOrder::builder()
        .summary("did things")
        .tags(["foo".to_string()].into())
        .build();
    let json = serde_json::to_string(&wo).unwrap();
    let parsed: WorkOrder = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, wo);
}

#[test]
fn priority_auto_approval() {
    assert!(Priority::P3Low.auto_approves());
    assert!(Priority::P2Medium.auto_approves());
    assert!(!Priority::P1High.auto_approves());
    assert!(!Priority::P0Critical.auto_approves());
}
