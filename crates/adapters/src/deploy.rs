// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edge-function deploy adapter.

use async_trait::async_trait;
use fm_core::ErrorClass;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// One source file of an edge function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Error)]
pub enum EdgeDeployError {
    #[error("deploy endpoint returned {0}: {1}")]
    Status(u16, String),
    #[error("deploy request timed out: {0}")]
    Timeout(String),
    #[error("deploy transport error: {0}")]
    Transport(String),
}

impl EdgeDeployError {
    pub fn error_class(&self) -> ErrorClass {
        match self {
            EdgeDeployError::Timeout(_) => ErrorClass::NetworkTimeout,
            _ => ErrorClass::ExternalFailure,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if crate::http::is_timeout(&err) {
            EdgeDeployError::Timeout(err.to_string())
        } else {
            EdgeDeployError::Transport(err.to_string())
        }
    }
}

/// The deploy contract: PATCH existing functions, POST new ones, probe the
/// live endpoint after deploy.
#[async_trait]
pub trait EdgeDeploy: Send + Sync {
    async fn function_exists(&self, name: &str) -> Result<bool, EdgeDeployError>;
    async fn create_function(
        &self,
        name: &str,
        files: &[DeployFile],
        entrypoint: Option<&str>,
    ) -> Result<(), EdgeDeployError>;
    async fn update_function(
        &self,
        name: &str,
        files: &[DeployFile],
        entrypoint: Option<&str>,
    ) -> Result<(), EdgeDeployError>;
    /// HEAD/GET the function endpoint; true when it answers.
    async fn probe(&self, name: &str) -> Result<bool, EdgeDeployError>;
}

const DEPLOY_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the functions control plane.
pub struct HttpEdgeDeploy {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl HttpEdgeDeploy {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http: crate::http::client(DEPLOY_TIMEOUT), base: base.into(), token: token.into() }
    }

    fn body(name: &str, files: &[DeployFile], entrypoint: Option<&str>) -> serde_json::Value {
        json!({
            "name": name,
            "files": files,
            "entrypoint": entrypoint.unwrap_or("index.ts"),
        })
    }

    async fn send_deploy(
        &self,
        method: reqwest::Method,
        url: String,
        body: serde_json::Value,
    ) -> Result<(), EdgeDeployError> {
        let resp = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(EdgeDeployError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EdgeDeployError::Status(status.as_u16(), text));
        }
        Ok(())
    }
}

#[async_trait]
impl EdgeDeploy for HttpEdgeDeploy {
    async fn function_exists(&self, name: &str) -> Result<bool, EdgeDeployError> {
        let resp = self
            .http
            .get(format!("{}/functions/{}", self.base, name))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(EdgeDeployError::from_reqwest)?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            code => Err(EdgeDeployError::Status(code, resp.text().await.unwrap_or_default())),
        }
    }

    async fn create_function(
        &self,
        name: &str,
        files: &[DeployFile],
        entrypoint: Option<&str>,
    ) -> Result<(), EdgeDeployError> {
        let url = format!("{}/functions", self.base);
        self.send_deploy(reqwest::Method::POST, url, Self::body(name, files, entrypoint)).await
    }

    async fn update_function(
        &self,
        name: &str,
        files: &[DeployFile],
        entrypoint: Option<&str>,
    ) -> Result<(), EdgeDeployError> {
        let url = format!("{}/functions/{}", self.base, name);
        self.send_deploy(reqwest::Method::PATCH, url, Self::body(name, files, entrypoint)).await
    }

    async fn probe(&self, name: &str) -> Result<bool, EdgeDeployError> {
        let url = format!("{}/functions/{}/invoke", self.base, name);
        let head = self
            .http
            .head(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success() || r.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED);
        if let Ok(true) = head {
            return Ok(true);
        }
        let get = self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(EdgeDeployError::from_reqwest)?;
        Ok(get.status().as_u16() < 500)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEdgeDeploy;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Inner {
        functions: HashMap<String, Vec<DeployFile>>,
        creates: Vec<String>,
        updates: Vec<String>,
        probe_ok: bool,
    }

    /// In-memory deploy target.
    pub struct FakeEdgeDeploy {
        inner: Mutex<Inner>,
    }

    impl FakeEdgeDeploy {
        pub fn new() -> Self {
            Self { inner: Mutex::new(Inner { probe_ok: true, ..Inner::default() }) }
        }

        pub fn set_probe_ok(&self, ok: bool) {
            self.inner.lock().probe_ok = ok;
        }

        pub fn deployed(&self, name: &str) -> Option<Vec<DeployFile>> {
            self.inner.lock().functions.get(name).cloned()
        }

        pub fn creates(&self) -> Vec<String> {
            self.inner.lock().creates.clone()
        }

        pub fn updates(&self) -> Vec<String> {
            self.inner.lock().updates.clone()
        }
    }

    impl Default for FakeEdgeDeploy {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl EdgeDeploy for FakeEdgeDeploy {
        async fn function_exists(&self, name: &str) -> Result<bool, EdgeDeployError> {
            Ok(self.inner.lock().functions.contains_key(name))
        }

        async fn create_function(
            &self,
            name: &str,
            files: &[DeployFile],
            _entrypoint: Option<&str>,
        ) -> Result<(), EdgeDeployError> {
            let mut inner = self.inner.lock();
            inner.functions.insert(name.to_string(), files.to_vec());
            inner.creates.push(name.to_string());
            Ok(())
        }

        async fn update_function(
            &self,
            name: &str,
            files: &[DeployFile],
            _entrypoint: Option<&str>,
        ) -> Result<(), EdgeDeployError> {
            let mut inner = self.inner.lock();
            inner.functions.insert(name.to_string(), files.to_vec());
            inner.updates.push(name.to_string());
            Ok(())
        }

        async fn probe(&self, _name: &str) -> Result<bool, EdgeDeployError> {
            Ok(self.inner.lock().probe_ok)
        }
    }
}
