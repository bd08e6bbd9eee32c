// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exec sandbox adapter.
//!
//! The sandbox is an external HTTP service holding a working-tree checkout.
//! Commands are bounded and client-abortable; policy (whitelisting, arg
//! safety) lives in the engine, not here.

use async_trait::async_trait;
use fm_core::ErrorClass;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One command execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_ms: u64,
    pub wo_slug: String,
}

/// Captured output of a sandbox command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("sandbox request timed out after {0}ms")]
    Timeout(u64),
    #[error("sandbox returned {0}: {1}")]
    Status(u16, String),
    #[error("sandbox transport error: {0}")]
    Transport(String),
}

impl SandboxError {
    pub fn error_class(&self) -> ErrorClass {
        match self {
            SandboxError::Timeout(_) => ErrorClass::NetworkTimeout,
            _ => ErrorClass::ExternalFailure,
        }
    }
}

/// The sandbox contract.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn exec(&self, request: &ExecRequest) -> Result<ExecResult, SandboxError>;
    async fn pipeline(&self, requests: &[ExecRequest]) -> Result<Vec<ExecResult>, SandboxError>;
    /// Refresh the working tree for a WO's repository.
    async fn git_pull(&self, wo_slug: &str) -> Result<(), SandboxError>;
}

/// HTTP client for the sandbox service.
pub struct HttpSandbox {
    http: reqwest::Client,
    base: String,
}

impl HttpSandbox {
    pub fn new(base: impl Into<String>) -> Self {
        // Per-request deadlines are set from each request's timeout_ms.
        Self { http: reqwest::Client::new(), base: base.into() }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        timeout_ms: u64,
    ) -> Result<T, SandboxError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .timeout(Duration::from_millis(timeout_ms.saturating_add(2_000)))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if crate::http::is_timeout(&e) {
                    SandboxError::Timeout(timeout_ms)
                } else {
                    SandboxError::Transport(e.to_string())
                }
            })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| SandboxError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(SandboxError::Status(status.as_u16(), text));
        }
        serde_json::from_str(&text).map_err(|e| SandboxError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Sandbox for HttpSandbox {
    async fn exec(&self, request: &ExecRequest) -> Result<ExecResult, SandboxError> {
        self.post("/exec", request, request.timeout_ms).await
    }

    async fn pipeline(&self, requests: &[ExecRequest]) -> Result<Vec<ExecResult>, SandboxError> {
        let total: u64 = requests.iter().map(|r| r.timeout_ms).sum();
        let body = serde_json::json!({ "commands": requests });
        self.post("/pipeline", &body, total).await
    }

    async fn git_pull(&self, wo_slug: &str) -> Result<(), SandboxError> {
        let body = serde_json::json!({ "wo_slug": wo_slug });
        let _: serde_json::Value = self.post("/git-pull", &body, 60_000).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSandbox;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Inner {
        responses: HashMap<String, ExecResult>,
        wc_sizes: HashMap<String, u64>,
        calls: Vec<ExecRequest>,
        git_pulls: Vec<String>,
    }

    /// Programmable sandbox double. Responses are keyed by command name;
    /// `wc -c` is answered from a path→size map so commit verification can
    /// be exercised.
    pub struct FakeSandbox {
        inner: Mutex<Inner>,
    }

    impl FakeSandbox {
        pub fn new() -> Self {
            Self { inner: Mutex::new(Inner::default()) }
        }

        pub fn respond(&self, command: &str, result: ExecResult) {
            self.inner.lock().responses.insert(command.to_string(), result);
        }

        /// Byte size `wc -c <path>` reports for a path.
        pub fn set_file_size(&self, path: &str, bytes: u64) {
            self.inner.lock().wc_sizes.insert(path.to_string(), bytes);
        }

        pub fn calls(&self) -> Vec<ExecRequest> {
            self.inner.lock().calls.clone()
        }

        pub fn git_pulls(&self) -> Vec<String> {
            self.inner.lock().git_pulls.clone()
        }
    }

    impl Default for FakeSandbox {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Sandbox for FakeSandbox {
        async fn exec(&self, request: &ExecRequest) -> Result<ExecResult, SandboxError> {
            let mut inner = self.inner.lock();
            inner.calls.push(request.clone());
            if request.command == "wc" {
                let path = request.args.iter().find(|a| !a.starts_with('-')).cloned();
                if let Some(path) = path {
                    let size = inner.wc_sizes.get(&path).copied().unwrap_or(0);
                    return Ok(ExecResult {
                        stdout: format!("{size} {path}\n"),
                        stderr: String::new(),
                        exit_code: 0,
                    });
                }
            }
            Ok(inner
                .responses
                .get(&request.command)
                .cloned()
                .unwrap_or(ExecResult { stdout: String::new(), stderr: String::new(), exit_code: 0 }))
        }

        async fn pipeline(
            &self,
            requests: &[ExecRequest],
        ) -> Result<Vec<ExecResult>, SandboxError> {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.exec(request).await?);
            }
            Ok(results)
        }

        async fn git_pull(&self, wo_slug: &str) -> Result<(), SandboxError> {
            self.inner.lock().git_pulls.push(wo_slug.to_string());
            Ok(())
        }
    }
}
