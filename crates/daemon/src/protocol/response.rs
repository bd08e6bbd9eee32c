// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fm_core::ToolResult;
use fm_engine::HealthReport;
use serde::{Deserialize, Serialize};

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    /// Handshake accepted
    Hello { version: String },

    /// Generic acknowledgement
    Ok,

    /// Tool dispatch outcome
    Tool { result: ToolResult },

    /// Ops health-check report
    Health { report: HealthReport },

    /// Daemon status snapshot
    Status {
        version: String,
        uptime_ms: u64,
        in_progress_wos: u64,
    },

    /// Request-level failure
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
