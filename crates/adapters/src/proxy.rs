// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verify proxy: an external service that executes a mutation and records
//! it server-side with `proxy_mode=edge_proxy`. A `None` forward result
//! means the proxy declined; the dispatcher falls through to the
//! in-process handler.

use async_trait::async_trait;
use fm_core::{ToolResult, WorkOrderId};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error("verify proxy returned {0}: {1}")]
    Status(u16, String),
    #[error("verify proxy timed out: {0}")]
    Timeout(String),
    #[error("verify proxy transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait VerifyProxy: Send + Sync {
    async fn forward(
        &self,
        tool: &str,
        input: &Value,
        actor: &str,
        wo_id: &WorkOrderId,
    ) -> Result<Option<ToolResult>, ProxyError>;
}

const PROXY_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the verify proxy.
pub struct HttpVerifyProxy {
    http: reqwest::Client,
    base: String,
}

impl HttpVerifyProxy {
    pub fn new(base: impl Into<String>) -> Self {
        Self { http: crate::http::client(PROXY_TIMEOUT), base: base.into() }
    }
}

#[async_trait]
impl VerifyProxy for HttpVerifyProxy {
    async fn forward(
        &self,
        tool: &str,
        input: &Value,
        actor: &str,
        wo_id: &WorkOrderId,
    ) -> Result<Option<ToolResult>, ProxyError> {
        let body = json!({ "tool": tool, "input": input, "actor": actor, "work_order_id": wo_id });
        let resp = self
            .http
            .post(format!("{}/verify", self.base))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if crate::http::is_timeout(&e) {
                    ProxyError::Timeout(e.to_string())
                } else {
                    ProxyError::Transport(e.to_string())
                }
            })?;
        let status = resp.status();
        // 204: proxy declined this call; execute in-process.
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = resp.text().await.map_err(|e| ProxyError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ProxyError::Status(status.as_u16(), text));
        }
        let result: ToolResult =
            serde_json::from_str(&text).map_err(|e| ProxyError::Transport(e.to_string()))?;
        Ok(Some(result))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeVerifyProxy;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Inner {
        results: HashMap<String, ToolResult>,
        calls: Vec<String>,
    }

    /// Proxy double: answers for configured tools, declines the rest.
    pub struct FakeVerifyProxy {
        inner: Mutex<Inner>,
    }

    impl FakeVerifyProxy {
        pub fn new() -> Self {
            Self { inner: Mutex::new(Inner::default()) }
        }

        pub fn respond_for(&self, tool: &str, result: ToolResult) {
            self.inner.lock().results.insert(tool.to_string(), result);
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }
    }

    impl Default for FakeVerifyProxy {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl VerifyProxy for FakeVerifyProxy {
        async fn forward(
            &self,
            tool: &str,
            _input: &Value,
            _actor: &str,
            _wo_id: &WorkOrderId,
        ) -> Result<Option<ToolResult>, ProxyError> {
            let mut inner = self.inner.lock();
            inner.calls.push(tool.to_string());
            Ok(inner.results.get(tool).cloned())
        }
    }
}
