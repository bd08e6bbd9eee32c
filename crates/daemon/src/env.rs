// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment configuration for the daemon.

use std::path::PathBuf;
use std::time::Duration;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Unix socket path (`FOREMAN_SOCKET`, default `/tmp/foreman.sock`).
pub fn socket_path() -> PathBuf {
    var("FOREMAN_SOCKET").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp/foreman.sock"))
}

/// Optional TCP listen address (`FOREMAN_TCP_ADDR`).
pub fn tcp_addr() -> Option<String> {
    var("FOREMAN_TCP_ADDR")
}

/// Auth token TCP clients must present in the Hello handshake
/// (`FOREMAN_AUTH_TOKEN`). Unset means TCP is unauthenticated-deny.
pub fn auth_token() -> Option<String> {
    var("FOREMAN_AUTH_TOKEN")
}

/// Git hosting API base (`FOREMAN_GIT_BASE`, default the public endpoint).
pub fn git_base() -> String {
    var("FOREMAN_GIT_BASE").unwrap_or_else(|| "https://api.github.com".into())
}

/// `owner/repo` this runtime operates on (`FOREMAN_GIT_REPO`).
pub fn git_repo() -> Option<String> {
    var("FOREMAN_GIT_REPO")
}

pub fn git_token() -> String {
    var("FOREMAN_GIT_TOKEN").unwrap_or_default()
}

/// Sandbox service base (`FOREMAN_SANDBOX_BASE`).
pub fn sandbox_base() -> String {
    var("FOREMAN_SANDBOX_BASE").unwrap_or_else(|| "http://127.0.0.1:8787".into())
}

/// Store RPC base (`FOREMAN_STORE_BASE`). Unset runs on the in-memory
/// store (single-process mode, state dies with the daemon).
pub fn store_base() -> Option<String> {
    var("FOREMAN_STORE_BASE")
}

pub fn store_token() -> String {
    var("FOREMAN_STORE_TOKEN").unwrap_or_default()
}

/// Edge deploy control plane (`FOREMAN_DEPLOY_BASE`).
pub fn deploy_base() -> String {
    var("FOREMAN_DEPLOY_BASE").unwrap_or_else(|| "http://127.0.0.1:8788".into())
}

pub fn deploy_token() -> String {
    var("FOREMAN_DEPLOY_TOKEN").unwrap_or_default()
}

/// Agent runner endpoint for Ops redispatch (`FOREMAN_AGENT_BASE`).
pub fn agent_base() -> String {
    var("FOREMAN_AGENT_BASE").unwrap_or_else(|| "http://127.0.0.1:8789".into())
}

/// Verify proxy base (`FOREMAN_PROXY_BASE`). Unset disables proxy routing.
pub fn proxy_base() -> Option<String> {
    var("FOREMAN_PROXY_BASE")
}

/// TOML file extending the tag → required-tools rules
/// (`FOREMAN_TAG_RULES`).
pub fn tag_rules_path() -> Option<PathBuf> {
    var("FOREMAN_TAG_RULES").map(PathBuf::from)
}

/// Directory for daemon log files (`FOREMAN_LOG_DIR`).
pub fn log_dir() -> Option<PathBuf> {
    var("FOREMAN_LOG_DIR").map(PathBuf::from)
}

/// Per-request IPC deadline (`FOREMAN_IPC_TIMEOUT_MS`, default 30s).
pub fn ipc_timeout() -> Duration {
    var("FOREMAN_IPC_TIMEOUT_MS")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}
