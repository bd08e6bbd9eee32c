// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-adapters: outward HTTP clients for the external systems the runtime
//! assumes — git hosting, the exec sandbox, edge deploys, the verify proxy,
//! the agent gateway, and the store RPC surface.

pub mod agent_gateway;
pub mod deploy;
pub mod github;
mod http;
pub mod proxy;
pub mod sandbox;
pub mod store_rpc;

pub use agent_gateway::{AgentGateway, GatewayError, HttpAgentGateway};
pub use deploy::{DeployFile, EdgeDeploy, EdgeDeployError, HttpEdgeDeploy};
pub use github::{CommitInfo, CommitRef, FileEntry, GitHost, GitHostError, GithubClient, TreeEntry};
pub use proxy::{HttpVerifyProxy, ProxyError, VerifyProxy};
pub use sandbox::{ExecRequest, ExecResult, HttpSandbox, Sandbox, SandboxError};
pub use store_rpc::RpcStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use agent_gateway::FakeAgentGateway;
#[cfg(any(test, feature = "test-support"))]
pub use deploy::FakeEdgeDeploy;
#[cfg(any(test, feature = "test-support"))]
pub use github::FakeGitHost;
#[cfg(any(test, feature = "test-support"))]
pub use proxy::FakeVerifyProxy;
#[cfg(any(test, feature = "test-support"))]
pub use sandbox::FakeSandbox;
