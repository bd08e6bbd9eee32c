// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed tool results.
//!
//! Every tool boundary returns a tagged [`ToolResult`]; internal errors are
//! converted at the handler edge. Panics are not part of any contract.

use crate::error::ErrorClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The value a dispatch call returns to the agent loop.
///
/// `terminal=true` instructs the outer loop to stop (the WO suspended or
/// reached a terminal status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None, terminal: false }
    }

    pub fn ok_text(message: impl Into<String>) -> Self {
        Self::ok(Value::String(message.into()))
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()), terminal: false }
    }

    pub fn terminal(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None, terminal: true }
    }

    /// Serialized payload the ledger hashes: the data on success, the error
    /// string otherwise.
    pub fn hash_payload(&self) -> String {
        if self.success {
            self.data.as_ref().map(Value::to_string).unwrap_or_default()
        } else {
            self.error.clone().unwrap_or_default()
        }
    }
}

/// Typed failure a handler surfaces to the dispatcher.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub class: ErrorClass,
    pub message: String,
}

impl ToolError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidInput, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::PermissionDenied, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ExternalFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NetworkTimeout, message)
    }
}
