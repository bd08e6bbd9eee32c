// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fm_core::ActorRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request from a client (agent driver, ops trigger, human tooling) to the
/// daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello {
        version: String,
        /// Auth token for TCP connections (ignored for Unix socket)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Run one tool call through the dispatcher
    Dispatch {
        tool: String,
        #[serde(default)]
        input: Value,
        /// Authenticated actor identity supplied by the boundary
        actor: String,
        #[serde(default = "default_role")]
        role: ActorRole,
        wo_id: String,
        wo_slug: String,
    },

    /// Human-side answer to a pending clarification
    AnswerClarification {
        wo_id: String,
        response: String,
        responded_by: String,
    },

    /// Trigger one Ops health-check pass
    HealthCheck,

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,
}

fn default_role() -> ActorRole {
    ActorRole::Standard
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
