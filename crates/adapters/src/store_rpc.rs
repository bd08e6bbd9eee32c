// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store RPC client: the [`Store`] contract over HTTP.
//!
//! Every RPC is a POST to `{base}/rpc/{function}` with a JSON body. 5xx and
//! transport deadlines map to transient errors so the ledger's retry policy
//! applies; 4xx are terminal RPC failures.

use async_trait::async_trait;
use fm_core::{
    ActorProfile, ClarificationId, ClarificationRequest, DraftWorkOrder, ErrorEvent, ErrorSpike,
    ExecutionLogEntry, MutationId, MutationRecord, Permission, QaFinding, QaItem, TeamContext,
    WoEvent, WoEventRecord, WoStatus, WorkOrder, WorkOrderId,
};
use fm_storage::{DdlOptions, Store, StoreError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);
// DDL statements run under statement_timeout server-side; allow for it.
const DDL_RPC_TIMEOUT: Duration = Duration::from_secs(610);

/// HTTP implementation of the store contract.
pub struct RpcStore {
    http: reqwest::Client,
    ddl_http: reqwest::Client,
    base: String,
    token: String,
}

impl RpcStore {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: crate::http::client(RPC_TIMEOUT),
            ddl_http: crate::http::client(DDL_RPC_TIMEOUT),
            base: base.into(),
            token: token.into(),
        }
    }

    async fn call_with<T: DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        func: &str,
        body: Value,
    ) -> Result<T, StoreError> {
        let resp = client
            .post(format!("{}/rpc/{}", self.base, func))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if crate::http::is_timeout(&e) {
                    StoreError::Transient(format!("{func}: {e}"))
                } else {
                    StoreError::Rpc(format!("{func}: {e}"))
                }
            })?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| StoreError::Rpc(format!("{func}: {e}")))?;
        if status.is_server_error() {
            return Err(StoreError::Transient(format!("{func}: {} {}", status.as_u16(), text)));
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::Conflict(format!("{func}: {text}")));
        }
        if status == reqwest::StatusCode::LOCKED {
            return Err(StoreError::LockTimeout(format!("could not obtain lock: {text}")));
        }
        if !status.is_success() {
            return Err(StoreError::Rpc(format!("{func}: {} {}", status.as_u16(), text)));
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Rpc(format!("{func}: {e}")))
    }

    async fn call<T: DeserializeOwned>(&self, func: &str, body: Value) -> Result<T, StoreError> {
        self.call_with(&self.http, func, body).await
    }
}

#[async_trait]
impl Store for RpcStore {
    async fn create_work_order(&self, draft: DraftWorkOrder) -> Result<WorkOrder, StoreError> {
        self.call("create_draft_work_order", json!({ "draft": draft })).await
    }

    async fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, StoreError> {
        self.call("get_work_order", json!({ "id": id })).await
    }

    async fn work_order_by_slug(&self, slug: &str) -> Result<Option<WorkOrder>, StoreError> {
        self.call("get_work_order_by_slug", json!({ "slug": slug })).await
    }

    async fn work_orders_by_status(&self, status: WoStatus) -> Result<Vec<WorkOrder>, StoreError> {
        self.call("list_work_orders", json!({ "status": status })).await
    }

    async fn wo_transition(
        &self,
        id: &WorkOrderId,
        event: WoEvent,
        actor: &str,
        payload: &Value,
    ) -> Result<(), StoreError> {
        let _: Value = self
            .call(
                "wo_transition",
                json!({ "wo_id": id, "event": event, "actor": actor, "payload": payload }),
            )
            .await?;
        Ok(())
    }

    async fn update_summary(&self, id: &WorkOrderId, summary: &str) -> Result<(), StoreError> {
        let _: Value =
            self.call("update_work_order_state", json!({ "id": id, "summary": summary })).await?;
        Ok(())
    }

    async fn update_client_info(
        &self,
        id: &WorkOrderId,
        entries: &[(String, Value)],
    ) -> Result<(), StoreError> {
        let map: serde_json::Map<String, Value> =
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let _: Value = self
            .call("update_work_order_state", json!({ "id": id, "client_info": map }))
            .await?;
        Ok(())
    }

    async fn update_qa_checklist(
        &self,
        id: &WorkOrderId,
        items: &[QaItem],
    ) -> Result<(), StoreError> {
        let _: Value =
            self.call("update_qa_checklist", json!({ "id": id, "items": items })).await?;
        Ok(())
    }

    async fn append_wo_event(&self, record: &WoEventRecord) -> Result<(), StoreError> {
        let _: Value = self.call("append_wo_event", json!({ "record": record })).await?;
        Ok(())
    }

    async fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let _: Value = self.call("append_execution_log", json!({ "entry": entry })).await?;
        Ok(())
    }

    async fn execution_log(&self, id: &WorkOrderId) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        self.call("get_execution_log", json!({ "id": id })).await
    }

    async fn record_mutation(&self, record: &MutationRecord) -> Result<MutationId, StoreError> {
        #[derive(serde::Deserialize)]
        struct Response {
            mutation_id: MutationId,
        }
        let resp: Response = self.call("record_mutation", json!({ "record": record })).await?;
        Ok(resp.mutation_id)
    }

    async fn mutations_touching(
        &self,
        object_id: &str,
        window_ms: u64,
    ) -> Result<Vec<MutationRecord>, StoreError> {
        self.call("mutations_touching", json!({ "object_id": object_id, "window_ms": window_ms }))
            .await
    }

    async fn create_clarification(
        &self,
        request: &ClarificationRequest,
    ) -> Result<ClarificationId, StoreError> {
        #[derive(serde::Deserialize)]
        struct Response {
            id: ClarificationId,
        }
        let resp: Response =
            self.call("create_clarification", json!({ "request": request })).await?;
        Ok(resp.id)
    }

    async fn pending_clarification(
        &self,
        id: &WorkOrderId,
    ) -> Result<Option<ClarificationRequest>, StoreError> {
        self.call("pending_clarification", json!({ "wo_id": id })).await
    }

    async fn resolve_clarification(
        &self,
        id: &ClarificationId,
        response: &str,
        responded_by: &str,
    ) -> Result<(), StoreError> {
        let _: Value = self
            .call(
                "resolve_clarification",
                json!({ "id": id, "response": response, "responded_by": responded_by }),
            )
            .await?;
        Ok(())
    }

    async fn write_team_context(&self, entry: &TeamContext) -> Result<(), StoreError> {
        let _: Value = self.call("write_team_context", json!({ "entry": entry })).await?;
        Ok(())
    }

    async fn team_context(&self, root: &WorkOrderId) -> Result<Vec<TeamContext>, StoreError> {
        self.call("get_team_context", json!({ "root_wo_id": root })).await
    }

    async fn actor_profile(&self, name: &str) -> Result<Option<ActorProfile>, StoreError> {
        self.call("get_actor_profile", json!({ "name": name })).await
    }

    async fn check_agent_permission(
        &self,
        actor: &str,
        tool: &str,
    ) -> Result<Permission, StoreError> {
        self.call("check_agent_permission", json!({ "agent": actor, "tool": tool })).await
    }

    async fn record_error_event(&self, event: &ErrorEvent) -> Result<(), StoreError> {
        let _: Value = self.call("record_error_event", json!({ "event": event })).await?;
        Ok(())
    }

    async fn get_error_spikes(
        &self,
        window_minutes: u32,
        threshold: u32,
    ) -> Result<Vec<ErrorSpike>, StoreError> {
        self.call(
            "get_error_spikes",
            json!({ "window_minutes": window_minutes, "threshold": threshold }),
        )
        .await
    }

    async fn record_qa_finding(&self, finding: &QaFinding) -> Result<(), StoreError> {
        let _: Value = self.call("record_qa_finding", json!({ "finding": finding })).await?;
        Ok(())
    }

    async fn agent_query(&self, sql: &str) -> Result<Value, StoreError> {
        self.call("agent_query", json!({ "query": sql })).await
    }

    async fn agent_execute_ddl(&self, sql: &str, opts: &DdlOptions) -> Result<(), StoreError> {
        let body = json!({
            "query": sql,
            "advisory_lock_key": opts.advisory_lock_key,
            "lock_timeout_ms": opts.lock_timeout_ms,
            "statement_timeout_ms": opts.statement_timeout_ms,
        });
        let _: Value = self.call_with(&self.ddl_http, "agent_execute_ddl", body).await?;
        Ok(())
    }

    async fn agent_execute_dml(&self, sql: &str) -> Result<(), StoreError> {
        let _: Value = self.call("agent_execute_dml", json!({ "query": sql })).await?;
        Ok(())
    }

    async fn agent_set_config(&self, sql: &str) -> Result<(), StoreError> {
        let _: Value = self.call("agent_set_config", json!({ "query": sql })).await?;
        Ok(())
    }

    async fn read_table(&self, table: &str, limit: u32) -> Result<Value, StoreError> {
        self.call("read_table", json!({ "table": table, "limit": limit })).await
    }

    async fn get_schema(&self) -> Result<Value, StoreError> {
        self.call("get_schema", json!({})).await
    }

    async fn knowledge_query(&self, kind: &str, query: &str) -> Result<Value, StoreError> {
        self.call("knowledge_query", json!({ "kind": kind, "query": query })).await
    }
}
