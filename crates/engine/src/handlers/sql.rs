// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped SQL handlers: execute_sql and apply_migration.

use crate::dispatch::{parse_input, Dispatcher, HandlerOutput, LedgerFacts, ToolCtx};
use crate::sql::{classify_sql, contains_bypass, leading_keyword, SqlClass};
use fm_core::{clip, Clock, ErrorClass, ToolError, ToolResult};
use fm_storage::{DdlOptions, Store as _, StoreError};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// SELECT results are truncated to this many serialized chars.
const SELECT_RESULT_MAX: usize = 8_000;
const TRUNCATION_MARKER: &str = "… [truncated]";

const LOCK_TIMEOUT_MS: u64 = 10_000;
const STATEMENT_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Deserialize)]
struct ExecuteSqlInput {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ApplyMigrationInput {
    name: String,
    query: String,
}

/// Advisory-lock key for a migration name: the first 8 bytes of
/// SHA-256(name), big-endian.
pub(crate) fn migration_lock_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

fn class_action(class: SqlClass) -> &'static str {
    match class {
        SqlClass::Read => "SELECT",
        SqlClass::Ddl | SqlClass::Destructive => "DDL",
        SqlClass::Dml => "DML",
        SqlClass::Config => "SET",
        SqlClass::Unknown => "EXEC",
    }
}

impl<C: Clock> Dispatcher<C> {
    pub(crate) async fn handle_execute_sql(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: ExecuteSqlInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let query = parsed.query;
        let class = classify_sql(&query);
        let facts = || {
            LedgerFacts::new("database", leading_keyword(&query), class_action(class))
                .with("query", Value::String(clip(&query, 200).to_string()))
        };

        if !ctx.actor.is_master() && contains_bypass(&query) {
            return HandlerOutput::fail_recorded(
                ToolError::permission_denied(
                    "bypass statement rejected: set_config and enforcement flags are master-only",
                ),
                facts(),
            );
        }

        match class {
            SqlClass::Destructive => HandlerOutput::fail_recorded(
                ToolError::permission_denied(
                    "DROP/TRUNCATE are not allowed in execute_sql; use apply_migration",
                ),
                facts(),
            ),
            SqlClass::Unknown => {
                HandlerOutput::fail(ToolError::invalid_input("unclassifiable SQL statement"))
            }
            SqlClass::Read => match self.store.agent_query(&query).await {
                Ok(rows) => {
                    let full = rows.to_string();
                    let mut serialized = clip(&full, SELECT_RESULT_MAX).to_string();
                    if serialized.len() < full.len() {
                        serialized.push_str(TRUNCATION_MARKER);
                    }
                    // Reads are not recorded: no ledger facts.
                    HandlerOutput::ok(ToolResult::ok(Value::String(serialized)))
                }
                Err(e) => HandlerOutput::fail(store_error(e)),
            },
            SqlClass::Ddl | SqlClass::Dml | SqlClass::Config => {
                if ctx.actor.is_read_only() {
                    return HandlerOutput::fail_recorded(
                        ToolError::permission_denied(
                            "read-only actor may not execute write statements",
                        ),
                        facts(),
                    );
                }
                let outcome = match class {
                    SqlClass::Ddl => {
                        let opts = DdlOptions {
                            advisory_lock_key: migration_lock_key(&query),
                            lock_timeout_ms: LOCK_TIMEOUT_MS,
                            statement_timeout_ms: STATEMENT_TIMEOUT_MS,
                        };
                        self.store.agent_execute_ddl(&query, &opts).await
                    }
                    SqlClass::Dml => self.store.agent_execute_dml(&query).await,
                    _ => self.store.agent_set_config(&query).await,
                };
                match outcome {
                    // EXECUTE-direct paths cannot read back affected rows.
                    Ok(()) => HandlerOutput::ok_recorded(
                        ToolResult::ok_text("executed successfully"),
                        facts(),
                    ),
                    Err(e) => HandlerOutput::fail_recorded(store_error(e), facts()),
                }
            }
        }
    }

    pub(crate) async fn handle_apply_migration(
        &self,
        input: &Value,
        ctx: &ToolCtx,
    ) -> HandlerOutput {
        let parsed: ApplyMigrationInput = match parse_input(input) {
            Ok(v) => v,
            Err(e) => return HandlerOutput::fail(e),
        };
        let lock_key = migration_lock_key(&parsed.name);
        let facts = || {
            LedgerFacts::new("migration", parsed.name.clone(), "DDL")
                .with("lock_key", json!(lock_key))
        };

        if !ctx.actor.is_master() && contains_bypass(&parsed.query) {
            return HandlerOutput::fail_recorded(
                ToolError::permission_denied(
                    "bypass statement embedded in migration rejected: master-only",
                ),
                facts(),
            );
        }

        let opts = DdlOptions {
            advisory_lock_key: lock_key,
            lock_timeout_ms: LOCK_TIMEOUT_MS,
            statement_timeout_ms: STATEMENT_TIMEOUT_MS,
        };
        match self.store.agent_execute_ddl(&parsed.query, &opts).await {
            Ok(()) => HandlerOutput::ok_recorded(
                ToolResult::ok(json!({
                    "migration": parsed.name.clone(),
                    "status": "applied",
                })),
                facts(),
            ),
            Err(StoreError::LockTimeout(detail)) => HandlerOutput::fail_recorded(
                ToolError::new(
                    ErrorClass::LockContention,
                    format!(
                        "could not obtain lock for migration {}: {detail}; retry shortly",
                        parsed.name
                    ),
                ),
                facts(),
            ),
            Err(e) => HandlerOutput::fail_recorded(store_error(e), facts()),
        }
    }
}

fn store_error(e: StoreError) -> ToolError {
    match e {
        StoreError::LockTimeout(detail) => ToolError::new(ErrorClass::LockContention, detail),
        StoreError::Transient(detail) => ToolError::external(detail),
        other => ToolError::external(other.to_string()),
    }
}
