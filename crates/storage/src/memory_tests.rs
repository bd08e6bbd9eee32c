// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{DraftWorkOrder, FakeClock, Phase, Priority, WorkOrder};
use std::time::Duration;

fn draft(name: &str, priority: Priority) -> DraftWorkOrder {
    DraftWorkOrder {
        slug: None,
        name: name.to_string(),
        objective: "objective".into(),
        acceptance_criteria: vec!["1. works".into()],
        priority,
        assigned_actor: "builder".into(),
        tags: Default::default(),
        parent_id: None,
        client_info: Default::default(),
    }
}

#[tokio::test]
async fn create_auto_approves_low_priority_to_ready() {
    let store = MemoryStore::new();
    let wo = store.create_work_order(draft("Fix login", Priority::P2Medium)).await.unwrap();
    assert_eq!(wo.status, WoStatus::Ready);
    assert_eq!(wo.slug, "fix-login");
}

#[tokio::test]
async fn create_places_high_priority_in_pending_approval() {
    let store = MemoryStore::new();
    let wo = store.create_work_order(draft("Hotfix", Priority::P0Critical)).await.unwrap();
    assert_eq!(wo.status, WoStatus::PendingApproval);
}

#[tokio::test]
async fn slugs_are_uniqued_on_collision() {
    let store = MemoryStore::new();
    let a = store.create_work_order(draft("Same name", Priority::P2Medium)).await.unwrap();
    let b = store.create_work_order(draft("Same name", Priority::P2Medium)).await.unwrap();
    assert_eq!(a.slug, "same-name");
    assert_eq!(b.slug, "same-name-2");
    let found = store.work_order_by_slug("same-name-2").await.unwrap();
    assert_eq!(found.map(|w| w.id), Some(b.id));
}

#[tokio::test]
async fn transition_applies_event_and_stamps_completed_at() {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let wo = WorkOrder::builder().status(WoStatus::Review).build();
    store.seed_work_order(wo.clone());

    clock.advance(Duration::from_secs(5));
    store.wo_transition(&wo.id, WoEvent::MarkDone, "lead", &Value::Null).await.unwrap();

    let updated = store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(updated.status, WoStatus::Done);
    assert_eq!(updated.completed_at, Some(clock.epoch_ms()));
    assert!(updated.updated_at > wo.updated_at);
}

#[tokio::test]
async fn silently_rejected_transition_leaves_row_untouched() {
    let store = MemoryStore::new();
    let wo = WorkOrder::builder().build();
    store.seed_work_order(wo.clone());
    store.silently_reject_transitions(&wo.id);

    store
        .wo_transition(&wo.id, WoEvent::SubmitForReview, "builder", &Value::Null)
        .await
        .unwrap();
    let after = store.work_order(&wo.id).await.unwrap().unwrap();
    assert_eq!(after.status, WoStatus::InProgress);
}

#[tokio::test]
async fn invalid_transition_is_a_conflict() {
    let store = MemoryStore::new();
    let wo = WorkOrder::builder().status(WoStatus::Draft).build();
    store.seed_work_order(wo.clone());

    let err = store
        .wo_transition(&wo.id, WoEvent::SubmitForReview, "builder", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn mutations_touching_matches_object_and_context_paths() {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let wo = WorkOrder::builder().build();

    let direct = fm_core::MutationRecord::success(
        wo.id,
        "github_push_files",
        "repository",
        "src/app.ts",
        "PUSH",
        "builder",
        clock.epoch_ms(),
    );
    store.record_mutation(&direct).await.unwrap();

    let via_context = fm_core::MutationRecord::success(
        wo.id,
        "github_push_files",
        "repository",
        "src/other.ts",
        "PUSH",
        "builder",
        clock.epoch_ms(),
    )
    .with_context("paths", json!(["src/app.ts", "src/other.ts"]));
    store.record_mutation(&via_context).await.unwrap();

    let hits = store.mutations_touching("src/app.ts", 60_000).await.unwrap();
    assert_eq!(hits.len(), 2);

    clock.advance(Duration::from_secs(120));
    let stale = store.mutations_touching("src/app.ts", 60_000).await.unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn ddl_lock_contention_times_out() {
    let store = MemoryStore::new();
    store.hold_ddl_lock(42);
    let opts = DdlOptions { advisory_lock_key: 42, lock_timeout_ms: 10_000, statement_timeout_ms: 600_000 };
    let err = store.agent_execute_ddl("CREATE TABLE t (id int)", &opts).await.unwrap_err();
    assert!(matches!(err, StoreError::LockTimeout(_)));
    assert!(err.to_string().contains("could not obtain lock"));

    store.release_ddl_lock(42);
    store.agent_execute_ddl("CREATE TABLE t (id int)", &opts).await.unwrap();
    assert_eq!(store.sql_history().len(), 1);
}

#[tokio::test]
async fn error_spikes_group_by_code_and_source() {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    for _ in 0..6 {
        store
            .record_error_event(&fm_core::ErrorEvent {
                code: "ERR_X".into(),
                source: "dispatch".into(),
                work_order_id: None,
                detail: "boom".into(),
                created_at: clock.epoch_ms(),
            })
            .await
            .unwrap();
    }
    store
        .record_error_event(&fm_core::ErrorEvent {
            code: "ERR_Y".into(),
            source: "ops".into(),
            work_order_id: None,
            detail: "meh".into(),
            created_at: clock.epoch_ms(),
        })
        .await
        .unwrap();

    let spikes = store.get_error_spikes(10, 5).await.unwrap();
    assert_eq!(spikes.len(), 1);
    assert_eq!(spikes[0].code, "ERR_X");
    assert_eq!(spikes[0].count, 6);
}

#[tokio::test]
async fn pending_clarification_round_trip() {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let wo = WorkOrder::builder().build();
    let req = fm_core::ClarificationRequest::new(
        wo.id,
        "Which region?",
        fm_core::Urgency::High,
        clock.epoch_ms(),
    );
    let id = store.create_clarification(&req).await.unwrap();

    let pending = store.pending_clarification(&wo.id).await.unwrap().unwrap();
    assert_eq!(pending.question, "Which region?");

    store.resolve_clarification(&id, "us-east-1", "oncall").await.unwrap();
    assert!(store.pending_clarification(&wo.id).await.unwrap().is_none());
}

#[tokio::test]
async fn execution_log_preserves_per_wo_order() {
    let store = MemoryStore::new();
    let wo = WorkOrder::builder().build();
    for (i, phase) in [Phase::Spec, Phase::Plan, Phase::Stream].iter().enumerate() {
        store
            .append_execution_log(&fm_core::ExecutionLogEntry::event(
                wo.id,
                *phase,
                "builder",
                "step",
                i as u64,
            ))
            .await
            .unwrap();
    }
    let log = store.execution_log(&wo.id).await.unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].phase, Phase::Spec);
    assert_eq!(log[2].phase, Phase::Stream);
}

#[tokio::test]
async fn qa_findings_append() {
    let store = MemoryStore::new();
    let wo = WorkOrder::builder().build();
    store
        .record_qa_finding(&fm_core::QaFinding {
            work_order_id: wo.id,
            finding_type: fm_core::FindingType::Warn,
            category: "latency".into(),
            description: "p95 regressed".into(),
            evidence: Some("bench run 12".into()),
            resolved_at: None,
        })
        .await
        .unwrap();
    let rows = store.qa_finding_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "latency");
}

#[tokio::test]
async fn read_table_truncates_to_limit() {
    let store = MemoryStore::new();
    store.set_table("orders", json!([1, 2, 3, 4, 5]));
    let rows = store.read_table("orders", 2).await.unwrap();
    assert_eq!(rows, json!([1, 2]));
}
