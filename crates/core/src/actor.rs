// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actor identity and privilege scoping.
//!
//! An actor is the identity issuing a tool call (an agent name). The
//! boundary that accepted the request supplies the role; the store supplies
//! the full [`ActorProfile`] when the Ops loop needs execution mode and
//! tool allowances.

use serde::{Deserialize, Serialize};

/// Privilege level of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// May use scoped bypasses for system maintenance.
    Master,
    /// Normal agent: full tool surface, no bypass.
    Standard,
    /// May only dispatch read-classified tools and SQL.
    ReadOnly,
}

crate::display_labels! {
    ActorRole {
        Master => "master",
        Standard => "standard",
        ReadOnly => "read_only",
    }
}

/// Where an actor's execution loop runs.
///
/// `LocalCli` actors drive their own loop from a developer machine and emit
/// no server-side heartbeats, so the Ops loop must not judge them idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Server,
    LocalCli,
}

crate::display_labels! {
    ExecutionMode {
        Server => "server",
        LocalCli => "local_cli",
    }
}

/// The identity attached to a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: ActorRole) -> Self {
        Self { name: name.into(), role }
    }

    pub fn standard(name: impl Into<String>) -> Self {
        Self::new(name, ActorRole::Standard)
    }

    pub fn master(name: impl Into<String>) -> Self {
        Self::new(name, ActorRole::Master)
    }

    pub fn is_master(&self) -> bool {
        self.role == ActorRole::Master
    }

    pub fn is_read_only(&self) -> bool {
        self.role == ActorRole::ReadOnly
    }
}

/// Store-side actor record consumed by permission checks and the Ops loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub name: String,
    pub role: ActorRole,
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub tools_allowed: Vec<String>,
}

/// Result of a permission lookup for `(actor, tool)`.
///
/// `Unspecified` defaults to allow (fail-open) at the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Allow,
    Deny,
    Unspecified,
}
