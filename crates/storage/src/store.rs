// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store contract: the RPC surface the runtime assumes.
//!
//! The WO row is the single source of truth for status and metadata; the
//! mutation ledger, WO-event journal, and execution log are append-only.
//! The physical schema is out of scope — implementations are the in-memory
//! store (tests, local runs) and the HTTP RPC client in `fm-adapters`.

use async_trait::async_trait;
use fm_core::{
    ActorProfile, ClarificationId, ClarificationRequest, DraftWorkOrder, ErrorEvent, ErrorSpike,
    ExecutionLogEntry, MutationId, MutationRecord, Permission, QaFinding, QaItem, TeamContext,
    WoEvent, WoEventRecord, WoStatus, WorkOrder, WorkOrderId,
};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Retryable: the ledger retries these with backoff.
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Advisory lock wait exceeded lock_timeout.
    #[error("could not obtain lock: {0}")]
    LockTimeout(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Session options for a direct-DDL execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlOptions {
    /// Advisory lock key serializing this migration name across actors.
    pub advisory_lock_key: i64,
    pub lock_timeout_ms: u64,
    pub statement_timeout_ms: u64,
}

/// The persistent store the runtime writes through.
#[async_trait]
pub trait Store: Send + Sync {
    // === Work orders ===
    async fn create_work_order(&self, draft: DraftWorkOrder) -> Result<WorkOrder, StoreError>;
    async fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, StoreError>;
    async fn work_order_by_slug(&self, slug: &str) -> Result<Option<WorkOrder>, StoreError>;
    async fn work_orders_by_status(&self, status: WoStatus) -> Result<Vec<WorkOrder>, StoreError>;
    /// Apply a state-machine event to the WO row. The caller re-reads and
    /// verifies; a silently-rejected transition returns Ok.
    async fn wo_transition(
        &self,
        id: &WorkOrderId,
        event: WoEvent,
        actor: &str,
        payload: &Value,
    ) -> Result<(), StoreError>;
    async fn update_summary(&self, id: &WorkOrderId, summary: &str) -> Result<(), StoreError>;
    async fn update_client_info(
        &self,
        id: &WorkOrderId,
        entries: &[(String, Value)],
    ) -> Result<(), StoreError>;
    async fn update_qa_checklist(&self, id: &WorkOrderId, items: &[QaItem])
        -> Result<(), StoreError>;

    // === Journal and execution log ===
    async fn append_wo_event(&self, record: &WoEventRecord) -> Result<(), StoreError>;
    async fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;
    async fn execution_log(&self, id: &WorkOrderId) -> Result<Vec<ExecutionLogEntry>, StoreError>;

    // === Mutation ledger ===
    async fn record_mutation(&self, record: &MutationRecord) -> Result<MutationId, StoreError>;
    /// Ledger rows whose object_id matches, newest first, within the window.
    async fn mutations_touching(
        &self,
        object_id: &str,
        window_ms: u64,
    ) -> Result<Vec<MutationRecord>, StoreError>;

    // === Clarifications ===
    async fn create_clarification(
        &self,
        request: &ClarificationRequest,
    ) -> Result<ClarificationId, StoreError>;
    async fn pending_clarification(
        &self,
        id: &WorkOrderId,
    ) -> Result<Option<ClarificationRequest>, StoreError>;
    async fn resolve_clarification(
        &self,
        id: &ClarificationId,
        response: &str,
        responded_by: &str,
    ) -> Result<(), StoreError>;

    // === Team context ===
    async fn write_team_context(&self, entry: &TeamContext) -> Result<(), StoreError>;
    async fn team_context(&self, root: &WorkOrderId) -> Result<Vec<TeamContext>, StoreError>;

    // === Actors, permissions, diagnostics ===
    async fn actor_profile(&self, name: &str) -> Result<Option<ActorProfile>, StoreError>;
    async fn check_agent_permission(
        &self,
        actor: &str,
        tool: &str,
    ) -> Result<Permission, StoreError>;
    async fn record_error_event(&self, event: &ErrorEvent) -> Result<(), StoreError>;
    async fn get_error_spikes(
        &self,
        window_minutes: u32,
        threshold: u32,
    ) -> Result<Vec<ErrorSpike>, StoreError>;
    async fn record_qa_finding(&self, finding: &QaFinding) -> Result<(), StoreError>;

    // === Scoped SQL entry points ===
    /// Read path: JSON-aggregating wrapper around a SELECT.
    async fn agent_query(&self, sql: &str) -> Result<Value, StoreError>;
    /// EXECUTE-direct DDL under an advisory lock.
    async fn agent_execute_ddl(&self, sql: &str, opts: &DdlOptions) -> Result<(), StoreError>;
    /// EXECUTE-direct DML.
    async fn agent_execute_dml(&self, sql: &str) -> Result<(), StoreError>;
    /// Session-config statement (master-gated upstream).
    async fn agent_set_config(&self, sql: &str) -> Result<(), StoreError>;

    // === Read-side helpers ===
    async fn read_table(&self, table: &str, limit: u32) -> Result<Value, StoreError>;
    async fn get_schema(&self) -> Result<Value, StoreError>;
    /// Knowledge-base style lookups (`lessons`, `memory`, `ontology`,
    /// `object_links`, `pipeline_status`, `knowledge`).
    async fn knowledge_query(&self, kind: &str, query: &str) -> Result<Value, StoreError>;
}
