// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ops control loop: stuck-WO detection and proportional reaction.
//!
//! Runs on an external trigger. For each in_progress WO it derives idle
//! time from the execution log, redispatches up to a bound, then diagnoses
//! a failure archetype and fails the WO — guarded by a per-WO circuit
//! breaker so a wedged store can't wedge the loop.

use crate::tagmap::TagRules;
use crate::transition::TransitionEngine;
use fm_adapters::AgentGateway;
use fm_core::{
    Actor, Clock, DraftWorkOrder, ErrorSpike, ExecutionLogEntry, ExecutionMode, Phase, Priority,
    WoEvent, WoStatus, WorkOrder,
};
use fm_storage::Store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Tunables for the health probe.
pub struct OpsConfig {
    /// Minutes of silence before a WO counts as stuck.
    pub stuck_after_mins: u64,
    /// Window in which a checkpoint/continuation entry defers judgment.
    pub continuation_window_mins: u64,
    /// Redispatches before archetype diagnosis.
    pub max_redispatches: u64,
    /// mark_failed attempts before the circuit breaker trips.
    pub max_failure_attempts: u64,
    pub spike_window_mins: u32,
    pub spike_threshold: u32,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            stuck_after_mins: 10,
            continuation_window_mins: 15,
            max_redispatches: 3,
            max_failure_attempts: 3,
            spike_window_mins: 10,
            spike_threshold: 5,
        }
    }
}

/// One stuck WO and what the loop did about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckWo {
    pub slug: String,
    pub minutes_idle: u64,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,
}

/// The health-check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub checked_at: String,
    pub stuck_wos: Vec<StuckWo>,
    pub continuation_wos_skipped: u32,
    pub marked_failed: Vec<String>,
    pub error_spikes: Vec<ErrorSpike>,
    pub errors: Vec<String>,
}

const OPS_ACTOR: &str = "ops-monitor";
const RETRY_COUNT_KEY: &str = "ops_retry_count";

/// The periodic health probe.
pub struct OpsMonitor<C: Clock> {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AgentGateway>,
    transitions: TransitionEngine<C>,
    tag_rules: TagRules,
    config: OpsConfig,
    clock: C,
}

impl<C: Clock> OpsMonitor<C> {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn AgentGateway>,
        tag_rules: TagRules,
        config: OpsConfig,
        clock: C,
    ) -> Self {
        let transitions = TransitionEngine::new(Arc::clone(&store), clock.clone());
        Self { store, gateway, transitions, tag_rules, config, clock }
    }

    /// One full probe pass.
    pub async fn run_health_check(&self) -> HealthReport {
        let now = self.clock.epoch_ms();
        let mut report = HealthReport {
            checked_at: checked_at(now),
            stuck_wos: Vec::new(),
            continuation_wos_skipped: 0,
            marked_failed: Vec::new(),
            error_spikes: Vec::new(),
            errors: Vec::new(),
        };

        let active = match self.store.work_orders_by_status(WoStatus::InProgress).await {
            Ok(rows) => rows,
            Err(e) => {
                report.errors.push(format!("listing in_progress WOs failed: {e}"));
                return report;
            }
        };

        for wo in active {
            if let Err(e) = self.probe_one(&wo, now, &mut report).await {
                report.errors.push(format!("{}: {e}", wo.slug));
            }
        }

        match self
            .store
            .get_error_spikes(self.config.spike_window_mins, self.config.spike_threshold)
            .await
        {
            Ok(spikes) => report.error_spikes = spikes,
            Err(e) => report.errors.push(format!("error-spike probe failed: {e}")),
        }

        report
    }

    async fn probe_one(
        &self,
        wo: &WorkOrder,
        now: u64,
        report: &mut HealthReport,
    ) -> Result<(), String> {
        // local_cli actors drive their own loop and emit no server-side
        // heartbeats; idleness means nothing for them.
        if let Ok(Some(profile)) = self.store.actor_profile(&wo.assigned_actor).await {
            if profile.execution_mode == ExecutionMode::LocalCli {
                return Ok(());
            }
        }

        let log = self.store.execution_log(&wo.id).await.map_err(|e| e.to_string())?;
        let last_log = log.iter().map(|e| e.created_at).max().unwrap_or(0);
        let last_activity = last_log.max(wo.updated_at);
        let minutes_idle = now.saturating_sub(last_activity) / 60_000;
        if minutes_idle <= self.config.stuck_after_mins {
            return Ok(());
        }

        let continuation_cutoff =
            now.saturating_sub(self.config.continuation_window_mins * 60_000);
        let has_recent_continuation = log.iter().any(|e| {
            matches!(e.phase, Phase::Checkpoint | Phase::Continuation)
                && e.created_at >= continuation_cutoff
        });
        if has_recent_continuation {
            tracing::info!(wo = %wo.slug, minutes_idle, "continuation in flight; skipping");
            report.continuation_wos_skipped += 1;
            return Ok(());
        }

        tracing::warn!(wo = %wo.slug, minutes_idle, "stuck work order");
        let retry_count = wo.ops_retry_count();
        if retry_count < self.config.max_redispatches {
            let outcome = self.redispatch(wo, retry_count).await?;
            report.stuck_wos.push(StuckWo {
                slug: wo.slug.clone(),
                minutes_idle,
                outcome,
                archetype: None,
            });
            return Ok(());
        }

        let archetype = self.classify_archetype(wo, &log).await;
        let outcome = self.fail_stuck(wo, minutes_idle, &archetype, report).await?;
        report.stuck_wos.push(StuckWo {
            slug: wo.slug.clone(),
            minutes_idle,
            outcome,
            archetype: Some(archetype),
        });
        Ok(())
    }

    /// Poke the agent endpoint. 2xx resets the counter; 503 and network
    /// errors schedule another try; the WO is never failed here.
    async fn redispatch(&self, wo: &WorkOrder, retry_count: u64) -> Result<String, String> {
        let status = match self.gateway.redispatch(wo).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(wo = %wo.slug, error = %e, "redispatch transport error");
                503
            }
        };
        if (200..300).contains(&status) {
            self.set_retry_count(wo, 0).await;
            self.log_ops_event(wo, "redispatched", json!({ "status": status })).await;
            Ok("redispatched".into())
        } else {
            let next = retry_count + 1;
            self.set_retry_count(wo, next).await;
            self.log_ops_event(wo, "retry_scheduled", json!({ "status": status, "attempt": next }))
                .await;
            Ok("retry_scheduled".into())
        }
    }

    async fn set_retry_count(&self, wo: &WorkOrder, count: u64) {
        let entries = vec![(RETRY_COUNT_KEY.to_string(), json!(count))];
        if let Err(e) = self.store.update_client_info(&wo.id, &entries).await {
            tracing::error!(wo = %wo.slug, error = %e, "failed to update ops_retry_count");
        }
    }

    async fn log_ops_event(&self, wo: &WorkOrder, event_type: &str, detail: Value) {
        let entry = ExecutionLogEntry::event(
            wo.id,
            Phase::Stream,
            OPS_ACTOR,
            event_type,
            self.clock.epoch_ms(),
        )
        .with_detail("ops", detail);
        if let Err(e) = self.store.append_execution_log(&entry).await {
            tracing::error!(wo = %wo.slug, error = %e, "failed to log ops event");
        }
    }

    /// Pick a named failure pattern that decides the remediation strategy.
    async fn classify_archetype(&self, wo: &WorkOrder, log: &[ExecutionLogEntry]) -> String {
        if let Ok(Some(profile)) = self.store.actor_profile(&wo.assigned_actor).await {
            if !self.tag_rules.missing_tools(&wo.tags, &profile.tools_allowed).is_empty() {
                return "agent_mismatch".into();
            }
        }

        let mut reads = 0u64;
        let mut writes = 0u64;
        for entry in log {
            if entry.event_type() != Some("tool_call") {
                continue;
            }
            match entry.detail.get("access").and_then(Value::as_str) {
                Some("read") => reads += 1,
                Some("write") => writes += 1,
                _ => {}
            }
        }
        if reads >= 10 && reads > 5 * writes.max(1) {
            return "exploration_spiral".into();
        }

        "stuck_wo".into()
    }

    /// mark_failed with circuit breaker, plus remediation spawning for the
    /// archetypes that have a corrective action.
    async fn fail_stuck(
        &self,
        wo: &WorkOrder,
        minutes_idle: u64,
        archetype: &str,
        report: &mut HealthReport,
    ) -> Result<String, String> {
        let breaker_key = format!("ops_failure_attempt_{}", wo.id);
        let attempts = wo.client_info_u64(&breaker_key);
        if attempts >= self.config.max_failure_attempts {
            tracing::error!(wo = %wo.slug, attempts, "circuit breaker tripped; leaving for human action");
            self.log_ops_event(wo, "circuit_breaker_tripped", json!({ "attempts": attempts }))
                .await;
            return Ok("circuit_breaker_tripped".into());
        }

        let reason = format!(
            "ops health check: stuck for {minutes_idle}m after {} redispatches (archetype: {archetype})",
            self.config.max_redispatches
        );
        let ops = Actor::master(OPS_ACTOR);
        match self
            .transitions
            .apply(&wo.id, WoEvent::MarkFailed, &ops, json!({ "reason": reason }))
            .await
        {
            Ok(_) => {
                report.marked_failed.push(wo.slug.clone());
                if matches!(archetype, "agent_mismatch" | "exploration_spiral") {
                    if let Err(e) = self.spawn_remediation(wo, archetype).await {
                        report.errors.push(format!("remediation for {} failed: {e}", wo.slug));
                    }
                }
                Ok("marked_failed".into())
            }
            Err(fault) => {
                let next = attempts + 1;
                let entries = vec![(breaker_key, json!(next))];
                if let Err(e) = self.store.update_client_info(&wo.id, &entries).await {
                    tracing::error!(wo = %wo.slug, error = %e, "failed to bump circuit breaker");
                }
                report.errors.push(format!("mark_failed for {} failed: {fault}", wo.slug));
                Ok("mark_failed_error".into())
            }
        }
    }

    /// Spawn a child WO whose acceptance criteria encode the corrective
    /// action, tagged for the ops dashboard.
    async fn spawn_remediation(&self, wo: &WorkOrder, archetype: &str) -> Result<(), String> {
        let acceptance = match archetype {
            "agent_mismatch" => vec![
                format!(
                    "1. Identify the tools implied by tags {:?} that actor {} lacks",
                    wo.tags, wo.assigned_actor
                ),
                "2. Re-route the original objective to an actor whose tools_allowed covers them"
                    .to_string(),
            ],
            _ => vec![
                "1. Decompose the original objective into narrower sub-tasks".to_string(),
                "2. Delegate each sub-task with explicit file/table scope".to_string(),
            ],
        };
        let mut tags = wo.inheritable_tags();
        tags.insert("remediation".into());
        tags.insert("ops-diagnostic".into());
        tags.insert(format!("parent:{}", wo.slug));

        let draft = DraftWorkOrder {
            slug: None,
            name: format!("Remediate {} ({archetype})", wo.slug),
            objective: format!(
                "Correct the diagnosed {archetype} failure of work order {} and restart its objective: {}",
                wo.slug, wo.objective
            ),
            acceptance_criteria: acceptance,
            priority: Priority::P2Medium,
            assigned_actor: wo.assigned_actor.clone(),
            tags,
            parent_id: Some(wo.id),
            client_info: serde_json::Map::new(),
        };
        // Medium priority: auto-approved to ready at creation, picked up
        // by normal dispatch rather than started by the ops loop.
        let child = self.store.create_work_order(draft).await.map_err(|e| e.to_string())?;
        tracing::info!(parent = %wo.slug, child = %child.slug, archetype, "spawned remediation WO");
        Ok(())
    }
}

fn checked_at(epoch_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch_ms.to_string())
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
