// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent gateway: the redispatch endpoint the Ops loop pokes when a WO
//! looks stuck.

use async_trait::async_trait;
use fm_core::WorkOrder;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("agent endpoint timed out: {0}")]
    Timeout(String),
    #[error("agent endpoint transport error: {0}")]
    Transport(String),
}

/// Redispatch contract: returns the HTTP status the endpoint answered with.
/// Network errors are the caller's 503-equivalent.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn redispatch(&self, wo: &WorkOrder) -> Result<u16, GatewayError>;
}

const REDISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the agent runner endpoint.
pub struct HttpAgentGateway {
    http: reqwest::Client,
    base: String,
}

impl HttpAgentGateway {
    pub fn new(base: impl Into<String>) -> Self {
        Self { http: crate::http::client(REDISPATCH_TIMEOUT), base: base.into() }
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn redispatch(&self, wo: &WorkOrder) -> Result<u16, GatewayError> {
        let body = json!({
            "work_order_id": wo.id,
            "slug": wo.slug,
            "actor": wo.assigned_actor,
        });
        let resp = self
            .http
            .post(format!("{}/dispatch", self.base))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if crate::http::is_timeout(&e) {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;
        Ok(resp.status().as_u16())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgentGateway;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    struct Inner {
        responses: Vec<Result<u16, GatewayError>>,
        calls: Vec<String>,
    }

    /// Scripted gateway double: pops queued responses, defaults to 200.
    pub struct FakeAgentGateway {
        inner: Mutex<Inner>,
    }

    impl FakeAgentGateway {
        pub fn new() -> Self {
            Self { inner: Mutex::new(Inner { responses: Vec::new(), calls: Vec::new() }) }
        }

        /// Queue the next response (served in push order).
        pub fn push_response(&self, response: Result<u16, GatewayError>) {
            self.inner.lock().responses.push(response);
        }

        /// Slugs redispatched so far.
        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }
    }

    impl Default for FakeAgentGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AgentGateway for FakeAgentGateway {
        async fn redispatch(&self, wo: &WorkOrder) -> Result<u16, GatewayError> {
            let mut inner = self.inner.lock();
            inner.calls.push(wo.slug.clone());
            if inner.responses.is_empty() {
                Ok(200)
            } else {
                inner.responses.remove(0)
            }
        }
    }
}
