// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{Actor, ExecutionLogEntry, FakeClock, QaItem, QaStatus, WorkOrder};
use fm_storage::MemoryStore;
use serde_json::json;

fn engine_with(wo: WorkOrder) -> (TransitionEngine<FakeClock>, Arc<MemoryStore<FakeClock>>) {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    store.seed_work_order(wo);
    (TransitionEngine::new(store.clone(), clock), store)
}

#[tokio::test]
async fn apply_moves_status_and_journals() {
    let wo = WorkOrder::builder().build();
    let (engine, store) = engine_with(wo.clone());

    let updated = engine
        .apply(&wo.id, WoEvent::SubmitForReview, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap();
    assert_eq!(updated.status, WoStatus::Review);

    let events = store.wo_event_rows();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].previous_status, WoStatus::InProgress);
    assert_eq!(events[0].new_status, WoStatus::Review);
    assert_eq!(events[0].actor, "builder");
}

#[tokio::test]
async fn invalid_event_is_rejected_without_rpc() {
    let wo = WorkOrder::builder().status(WoStatus::Draft).build();
    let (engine, store) = engine_with(wo.clone());

    let err = engine
        .apply(&wo.id, WoEvent::SubmitForReview, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionFault::Invalid(_)));
    assert_eq!(err.error_class(), ErrorClass::InvalidTransition);
    assert!(store.wo_event_rows().is_empty());
}

#[tokio::test]
async fn silently_rejected_rpc_yields_status_mismatch() {
    let wo = WorkOrder::builder().build();
    let (engine, store) = engine_with(wo.clone());
    store.silently_reject_transitions(&wo.id);

    let err = engine
        .apply(&wo.id, WoEvent::SubmitForReview, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Status transition failed: DB shows in_progress instead of review"
    );
    assert_eq!(err.error_class(), ErrorClass::StatusMismatch);

    let diags = store.error_event_rows();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, "ERR_STATUS_MISMATCH");
    assert_eq!(diags[0].work_order_id, Some(wo.id));
    // No journal row for a transition that did not verify.
    assert!(store.wo_event_rows().is_empty());
}

#[tokio::test]
async fn mark_failed_requires_reason() {
    let wo = WorkOrder::builder().build();
    let (engine, _) = engine_with(wo.clone());

    let err = engine
        .apply(&wo.id, WoEvent::MarkFailed, &Actor::standard("builder"), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionFault::MissingReason { .. }));

    engine
        .apply(&wo.id, WoEvent::MarkFailed, &Actor::standard("builder"), json!({"reason": "x"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn start_work_requires_assigned_or_master() {
    let wo = WorkOrder::builder().status(WoStatus::Ready).assigned_actor("alice").build();
    let (engine, _) = engine_with(wo.clone());

    let err = engine
        .apply(&wo.id, WoEvent::StartWork, &Actor::standard("mallory"), Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionFault::NotAuthorized { .. }));
    assert_eq!(err.error_class(), ErrorClass::PermissionDenied);

    engine.apply(&wo.id, WoEvent::StartWork, &Actor::master("root"), Value::Null).await.unwrap();
}

#[tokio::test]
async fn mark_done_blocked_by_failing_checklist_unless_master() {
    let wo = WorkOrder::builder()
        .status(WoStatus::Review)
        .qa_checklist(vec![QaItem {
            id: "1".into(),
            criterion: "deploys".into(),
            status: QaStatus::Fail,
            evidence: None,
        }])
        .build();
    let (engine, _) = engine_with(wo.clone());

    let err = engine
        .apply(&wo.id, WoEvent::MarkDone, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionFault::ChecklistFails { fails: 1 }));

    // Master override.
    engine.apply(&wo.id, WoEvent::MarkDone, &Actor::master("lead"), Value::Null).await.unwrap();
}

#[tokio::test]
async fn deployment_tagged_wo_needs_verification_entry() {
    let wo = WorkOrder::builder().tags(["edge-function".to_string()].into()).build();
    let (engine, store) = engine_with(wo.clone());

    let err = engine
        .apply(&wo.id, WoEvent::SubmitForReview, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionFault::DeploymentUnverified));

    store
        .append_execution_log(&ExecutionLogEntry::event(
            wo.id,
            Phase::DeploymentVerification,
            "builder",
            "deploy_probe",
            1,
        ))
        .await
        .unwrap();
    engine
        .apply(&wo.id, WoEvent::SubmitForReview, &Actor::standard("builder"), Value::Null)
        .await
        .unwrap();
}

#[test]
fn event_for_finds_table_edges() {
    assert_eq!(
        TransitionEngine::<FakeClock>::event_for(WoStatus::InProgress, WoStatus::Review),
        Some(WoEvent::SubmitForReview)
    );
    assert_eq!(
        TransitionEngine::<FakeClock>::event_for(WoStatus::InProgress, WoStatus::Failed),
        Some(WoEvent::MarkFailed)
    );
    assert_eq!(TransitionEngine::<FakeClock>::event_for(WoStatus::Draft, WoStatus::Review), None);
}
