// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    select = { "SELECT * FROM work_orders", SqlClass::Read },
    lowercase_select = { "select 1", SqlClass::Read },
    explain = { "EXPLAIN SELECT 1", SqlClass::Read },
    show = { "SHOW search_path", SqlClass::Read },
    with_read = { "WITH t AS (SELECT 1) SELECT * FROM t", SqlClass::Read },
    with_write = { "WITH t AS (SELECT 1) INSERT INTO x SELECT * FROM t", SqlClass::Dml },
    create = { "CREATE TABLE t (id int)", SqlClass::Ddl },
    alter = { "ALTER TABLE t ADD COLUMN c text", SqlClass::Ddl },
    insert = { "INSERT INTO t VALUES (1)", SqlClass::Dml },
    update = { "UPDATE t SET c = 1", SqlClass::Dml },
    delete = { "DELETE FROM t", SqlClass::Dml },
    do_block = { "DO $$ BEGIN END $$", SqlClass::Dml },
    set_config = { "SET statement_timeout = '10s'", SqlClass::Config },
    drop = { "DROP TABLE t", SqlClass::Destructive },
    truncate = { "TRUNCATE t", SqlClass::Destructive },
    garbage = { "GRANT ALL ON t TO x", SqlClass::Unknown },
)]
fn classification(sql: &str, expected: SqlClass) {
    assert_eq!(classify_sql(sql), expected);
}

#[parameterized(
    line_comment = { "-- sneaky\nDROP TABLE t", SqlClass::Destructive },
    block_comment = { "/* harmless */ TRUNCATE audit", SqlClass::Destructive },
    comment_hides_select = { "-- DROP TABLE t\nSELECT 1", SqlClass::Read },
)]
fn comments_do_not_mask_the_leading_keyword(sql: &str, expected: SqlClass) {
    assert_eq!(classify_sql(sql), expected);
}

#[test]
fn strip_removes_line_and_block_comments() {
    let sql = "SELECT 1 -- trailing\n/* block\nspanning */ FROM t";
    let stripped = strip_sql_comments(sql);
    assert!(!stripped.contains("trailing"));
    assert!(!stripped.contains("block"));
    assert!(stripped.contains("SELECT 1"));
    assert!(stripped.contains("FROM t"));
}

#[test]
fn strip_handles_unterminated_block_comment() {
    let stripped = strip_sql_comments("SELECT 1 /* open");
    assert!(stripped.starts_with("SELECT 1"));
}

#[parameterized(
    set_config_call = { "SELECT SET_CONFIG('app.wo_executor_bypass', 'on', false)" },
    lowercase = { "select set_config('x', 'y', true)" },
    executor_flag = { "SET app.wo_executor_bypass = 'on'" },
    state_flag = { "UPDATE t SET c = current_setting('app.state_write_bypass')" },
    embedded_in_migration = { "CREATE FUNCTION f() AS $$ SELECT SET_CONFIG('a','b',false) $$" },
)]
fn bypass_markers_are_detected(sql: &str) {
    assert!(contains_bypass(sql));
}

#[parameterized(
    plain_select = { "SELECT * FROM settings" },
    plain_set = { "SET lock_timeout = '10s'" },
    plain_update = { "UPDATE config SET value = 1" },
)]
fn benign_sql_has_no_bypass(sql: &str) {
    assert!(!contains_bypass(sql));
}

#[test]
fn bypass_hidden_in_comment_is_ignored() {
    // Comment-stripped scan: commented-out bypasses can't execute.
    assert!(!contains_bypass("SELECT 1 -- set_config('app.wo_executor_bypass','on',false)"));
}

proptest! {
    #[test]
    fn classification_is_total(sql in ".{0,200}") {
        // Never panics, always lands in a bucket.
        let _ = classify_sql(&sql);
    }

    #[test]
    fn leading_select_always_reads(tail in "[a-zA-Z0-9_, *]{0,80}") {
        let sql = format!("SELECT {tail}");
        prop_assert_eq!(classify_sql(&sql), SqlClass::Read);
    }

    #[test]
    fn strip_preserves_non_comment_bytes(body in "[a-zA-Z0-9 =']{0,80}") {
        let sql = format!("{body}-- comment");
        let stripped = strip_sql_comments(&sql);
        prop_assert!(stripped.starts_with(&body));
    }
}
