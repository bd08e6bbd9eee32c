// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests and single-process runs.
//!
//! Implements the full [`Store`] contract over mutex-guarded maps. The
//! test-support surface adds failure injection (transient ledger errors,
//! silently-rejected transitions, held advisory locks) so integrity
//! invariants can be exercised without a backing service.

use crate::store::{DdlOptions, Store, StoreError};
use async_trait::async_trait;
use fm_core::{
    next_status, slugify, ActorProfile, ClarificationId, ClarificationRequest,
    ClarificationStatus, Clock, DraftWorkOrder, ErrorEvent, ErrorSpike, ExecutionLogEntry,
    MutationId, MutationRecord, Permission, QaFinding, QaItem, SystemClock, TeamContext, WoEvent,
    WoEventRecord, WoStatus, WorkOrder, WorkOrderId,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Inner {
    work_orders: HashMap<WorkOrderId, WorkOrder>,
    slugs: HashMap<String, WorkOrderId>,
    wo_events: Vec<WoEventRecord>,
    execution_log: Vec<ExecutionLogEntry>,
    mutations: Vec<(MutationId, MutationRecord)>,
    clarifications: HashMap<ClarificationId, ClarificationRequest>,
    contexts: Vec<TeamContext>,
    actors: HashMap<String, ActorProfile>,
    permissions: HashMap<(String, String), Permission>,
    error_events: Vec<ErrorEvent>,
    qa_findings: Vec<QaFinding>,
    held_ddl_locks: HashSet<i64>,
    sql_history: Vec<(String, String)>,
    query_results: Vec<(String, Value)>,
    tables: HashMap<String, Value>,
    schema: Value,
    knowledge: HashMap<(String, String), Value>,
    fail_mutations: u32,
    reject_transitions: HashSet<WorkOrderId>,
}

/// Mutex-guarded in-memory implementation of [`Store`].
pub struct MemoryStore<C: Clock = SystemClock> {
    inner: Mutex<Inner>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { inner: Mutex::new(Inner::default()), clock }
    }

    fn unique_slug(inner: &Inner, base: &str) -> String {
        if !inner.slugs.contains_key(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !inner.slugs.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl<C: Clock> MemoryStore<C> {
    /// Make the next `n` record_mutation calls fail transiently.
    pub fn fail_next_mutations(&self, n: u32) {
        self.inner.lock().fail_mutations = n;
    }

    /// Simulate an optimistically-rejected transition: wo_transition returns
    /// Ok but the row is left unchanged.
    pub fn silently_reject_transitions(&self, id: &WorkOrderId) {
        self.inner.lock().reject_transitions.insert(*id);
    }

    pub fn clear_transition_rejection(&self, id: &WorkOrderId) {
        self.inner.lock().reject_transitions.remove(id);
    }

    /// Pre-hold an advisory lock so agent_execute_ddl times out.
    pub fn hold_ddl_lock(&self, key: i64) {
        self.inner.lock().held_ddl_locks.insert(key);
    }

    pub fn release_ddl_lock(&self, key: i64) {
        self.inner.lock().held_ddl_locks.remove(&key);
    }

    pub fn set_actor(&self, profile: ActorProfile) {
        self.inner.lock().actors.insert(profile.name.clone(), profile);
    }

    pub fn set_permission(&self, actor: &str, tool: &str, permission: Permission) {
        self.inner.lock().permissions.insert((actor.to_string(), tool.to_string()), permission);
    }

    /// Canned result for agent_query calls whose SQL contains `needle`.
    pub fn set_query_result(&self, needle: &str, result: Value) {
        self.inner.lock().query_results.push((needle.to_string(), result));
    }

    pub fn set_table(&self, table: &str, rows: Value) {
        self.inner.lock().tables.insert(table.to_string(), rows);
    }

    pub fn set_schema(&self, schema: Value) {
        self.inner.lock().schema = schema;
    }

    pub fn set_knowledge(&self, kind: &str, query: &str, result: Value) {
        self.inner.lock().knowledge.insert((kind.to_string(), query.to_string()), result);
    }

    /// Insert a WO row directly, bypassing the draft path.
    pub fn seed_work_order(&self, wo: WorkOrder) {
        let mut inner = self.inner.lock();
        inner.slugs.insert(wo.slug.clone(), wo.id);
        inner.work_orders.insert(wo.id, wo);
    }

    pub fn mutation_rows(&self) -> Vec<MutationRecord> {
        self.inner.lock().mutations.iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn wo_event_rows(&self) -> Vec<WoEventRecord> {
        self.inner.lock().wo_events.clone()
    }

    pub fn error_event_rows(&self) -> Vec<ErrorEvent> {
        self.inner.lock().error_events.clone()
    }

    pub fn log_entries(&self, id: &WorkOrderId) -> Vec<ExecutionLogEntry> {
        self.inner
            .lock()
            .execution_log
            .iter()
            .filter(|e| e.work_order_id == *id)
            .cloned()
            .collect()
    }

    pub fn sql_history(&self) -> Vec<(String, String)> {
        self.inner.lock().sql_history.clone()
    }

    pub fn context_rows(&self) -> Vec<TeamContext> {
        self.inner.lock().contexts.clone()
    }

    pub fn qa_finding_rows(&self) -> Vec<QaFinding> {
        self.inner.lock().qa_findings.clone()
    }
}

#[async_trait]
impl<C: Clock> Store for MemoryStore<C> {
    async fn create_work_order(&self, draft: DraftWorkOrder) -> Result<WorkOrder, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let base = draft.slug.unwrap_or_else(|| slugify(&draft.name));
        let slug = Self::unique_slug(&inner, &base);
        // Low-priority drafts auto-approve at creation and land in ready;
        // p0/p1 wait for a human approval gate.
        let status =
            if draft.priority.auto_approves() { WoStatus::Ready } else { WoStatus::PendingApproval };
        let wo = WorkOrder {
            id: WorkOrderId::new(),
            slug: slug.clone(),
            name: draft.name,
            objective: draft.objective,
            acceptance_criteria: draft.acceptance_criteria,
            priority: draft.priority,
            status,
            assigned_actor: draft.assigned_actor,
            tags: draft.tags,
            parent_id: draft.parent_id,
            qa_checklist: Vec::new(),
            client_info: draft.client_info,
            summary: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        inner.slugs.insert(slug, wo.id);
        inner.work_orders.insert(wo.id, wo.clone());
        Ok(wo)
    }

    async fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, StoreError> {
        Ok(self.inner.lock().work_orders.get(id).cloned())
    }

    async fn work_order_by_slug(&self, slug: &str) -> Result<Option<WorkOrder>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.slugs.get(slug).and_then(|id| inner.work_orders.get(id)).cloned())
    }

    async fn work_orders_by_status(&self, status: WoStatus) -> Result<Vec<WorkOrder>, StoreError> {
        let mut rows: Vec<WorkOrder> = self
            .inner
            .lock()
            .work_orders
            .values()
            .filter(|w| w.status == status)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.created_at);
        Ok(rows)
    }

    async fn wo_transition(
        &self,
        id: &WorkOrderId,
        event: WoEvent,
        _actor: &str,
        _payload: &Value,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        if inner.reject_transitions.contains(id) {
            // Row-level enforcement swallowed the write; the caller's
            // re-read verification is what catches this.
            return Ok(());
        }
        let wo = inner
            .work_orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let next = next_status(wo.status, event)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        wo.status = next;
        wo.updated_at = now;
        if next == WoStatus::Done {
            wo.completed_at = Some(now);
        }
        Ok(())
    }

    async fn update_summary(&self, id: &WorkOrderId, summary: &str) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let wo = inner
            .work_orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        wo.summary = Some(summary.to_string());
        wo.updated_at = now;
        Ok(())
    }

    async fn update_client_info(
        &self,
        id: &WorkOrderId,
        entries: &[(String, Value)],
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let wo = inner
            .work_orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        for (key, value) in entries {
            wo.client_info.insert(key.clone(), value.clone());
        }
        wo.updated_at = now;
        Ok(())
    }

    async fn update_qa_checklist(
        &self,
        id: &WorkOrderId,
        items: &[QaItem],
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let wo = inner
            .work_orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        wo.qa_checklist = items.to_vec();
        wo.updated_at = now;
        Ok(())
    }

    async fn append_wo_event(&self, record: &WoEventRecord) -> Result<(), StoreError> {
        self.inner.lock().wo_events.push(record.clone());
        Ok(())
    }

    async fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        self.inner.lock().execution_log.push(entry.clone());
        Ok(())
    }

    async fn execution_log(&self, id: &WorkOrderId) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .execution_log
            .iter()
            .filter(|e| e.work_order_id == *id)
            .cloned()
            .collect())
    }

    async fn record_mutation(&self, record: &MutationRecord) -> Result<MutationId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_mutations > 0 {
            inner.fail_mutations -= 1;
            return Err(StoreError::Transient("injected ledger failure".into()));
        }
        let id = MutationId::new();
        inner.mutations.push((id, record.clone()));
        Ok(id)
    }

    async fn mutations_touching(
        &self,
        object_id: &str,
        window_ms: u64,
    ) -> Result<Vec<MutationRecord>, StoreError> {
        let cutoff = self.clock.epoch_ms().saturating_sub(window_ms);
        let mut rows: Vec<MutationRecord> = self
            .inner
            .lock()
            .mutations
            .iter()
            .map(|(_, m)| m)
            .filter(|m| m.created_at >= cutoff)
            .filter(|m| {
                m.object_id == object_id
                    || m.context
                        .get("paths")
                        .and_then(Value::as_array)
                        .is_some_and(|paths| paths.iter().any(|p| p.as_str() == Some(object_id)))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create_clarification(
        &self,
        request: &ClarificationRequest,
    ) -> Result<ClarificationId, StoreError> {
        self.inner.lock().clarifications.insert(request.id, request.clone());
        Ok(request.id)
    }

    async fn pending_clarification(
        &self,
        id: &WorkOrderId,
    ) -> Result<Option<ClarificationRequest>, StoreError> {
        Ok(self
            .inner
            .lock()
            .clarifications
            .values()
            .find(|c| c.work_order_id == *id && c.is_pending())
            .cloned())
    }

    async fn resolve_clarification(
        &self,
        id: &ClarificationId,
        response: &str,
        responded_by: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let req = inner
            .clarifications
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        req.status = ClarificationStatus::Answered;
        req.response = Some(response.to_string());
        req.responded_by = Some(responded_by.to_string());
        req.answered_at = Some(now);
        Ok(())
    }

    async fn write_team_context(&self, entry: &TeamContext) -> Result<(), StoreError> {
        self.inner.lock().contexts.push(entry.clone());
        Ok(())
    }

    async fn team_context(&self, root: &WorkOrderId) -> Result<Vec<TeamContext>, StoreError> {
        Ok(self
            .inner
            .lock()
            .contexts
            .iter()
            .filter(|c| c.root_wo_id == *root)
            .cloned()
            .collect())
    }

    async fn actor_profile(&self, name: &str) -> Result<Option<ActorProfile>, StoreError> {
        Ok(self.inner.lock().actors.get(name).cloned())
    }

    async fn check_agent_permission(
        &self,
        actor: &str,
        tool: &str,
    ) -> Result<Permission, StoreError> {
        Ok(self
            .inner
            .lock()
            .permissions
            .get(&(actor.to_string(), tool.to_string()))
            .copied()
            .unwrap_or(Permission::Unspecified))
    }

    async fn record_error_event(&self, event: &ErrorEvent) -> Result<(), StoreError> {
        self.inner.lock().error_events.push(event.clone());
        Ok(())
    }

    async fn get_error_spikes(
        &self,
        window_minutes: u32,
        threshold: u32,
    ) -> Result<Vec<ErrorSpike>, StoreError> {
        let cutoff = self.clock.epoch_ms().saturating_sub(window_minutes as u64 * 60_000);
        let inner = self.inner.lock();
        let mut counts: HashMap<(String, String), u32> = HashMap::new();
        for event in inner.error_events.iter().filter(|e| e.created_at >= cutoff) {
            *counts.entry((event.code.clone(), event.source.clone())).or_insert(0) += 1;
        }
        let mut spikes: Vec<ErrorSpike> = counts
            .into_iter()
            .filter(|(_, count)| *count > threshold)
            .map(|((code, source), count)| ErrorSpike { code, source, count })
            .collect();
        spikes.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(spikes)
    }

    async fn record_qa_finding(&self, finding: &QaFinding) -> Result<(), StoreError> {
        self.inner.lock().qa_findings.push(finding.clone());
        Ok(())
    }

    async fn agent_query(&self, sql: &str) -> Result<Value, StoreError> {
        let mut inner = self.inner.lock();
        inner.sql_history.push(("query".into(), sql.to_string()));
        let result = inner
            .query_results
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| json!([]));
        Ok(result)
    }

    async fn agent_execute_ddl(&self, sql: &str, opts: &DdlOptions) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.held_ddl_locks.contains(&opts.advisory_lock_key) {
            return Err(StoreError::LockTimeout(format!(
                "could not obtain lock {} within {}ms",
                opts.advisory_lock_key, opts.lock_timeout_ms
            )));
        }
        inner.sql_history.push(("ddl".into(), sql.to_string()));
        Ok(())
    }

    async fn agent_execute_dml(&self, sql: &str) -> Result<(), StoreError> {
        self.inner.lock().sql_history.push(("dml".into(), sql.to_string()));
        Ok(())
    }

    async fn agent_set_config(&self, sql: &str) -> Result<(), StoreError> {
        self.inner.lock().sql_history.push(("config".into(), sql.to_string()));
        Ok(())
    }

    async fn read_table(&self, table: &str, limit: u32) -> Result<Value, StoreError> {
        let inner = self.inner.lock();
        let rows = inner.tables.get(table).cloned().unwrap_or_else(|| json!([]));
        if let Value::Array(mut items) = rows {
            items.truncate(limit as usize);
            return Ok(Value::Array(items));
        }
        Ok(rows)
    }

    async fn get_schema(&self) -> Result<Value, StoreError> {
        Ok(self.inner.lock().schema.clone())
    }

    async fn knowledge_query(&self, kind: &str, query: &str) -> Result<Value, StoreError> {
        Ok(self
            .inner
            .lock()
            .knowledge
            .get(&(kind.to_string(), query.to_string()))
            .cloned()
            .unwrap_or_else(|| json!([])))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
