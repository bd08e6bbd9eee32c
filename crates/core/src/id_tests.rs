// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::work_order::WorkOrderId;

#[test]
fn generated_ids_have_kind_tag_and_full_capacity() {
    let id = WorkOrderId::new();
    assert!(id.as_str().starts_with("wko-"));
    assert_eq!(id.as_str().len(), ID_CAPACITY);
    assert_eq!(id.suffix().len(), SUFFIX_LEN);
}

#[test]
fn ids_are_unique() {
    let a = WorkOrderId::new();
    let b = WorkOrderId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = WorkOrderId::from_string("wko-abc123");
    assert_eq!(id.as_str(), "wko-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn parse_clips_overlong_input() {
    let long = format!("wko-{}", "x".repeat(64));
    let id = WorkOrderId::from_string(&long);
    assert_eq!(id.as_str().len(), ID_CAPACITY);
    assert!(long.starts_with(id.as_str()));
}

#[test]
fn parse_folds_non_ascii() {
    let id = WorkOrderId::from_string("wko-caf\u{e9}");
    assert_eq!(id.as_str(), "wko-caf_");
}

#[test]
fn short_truncates_suffix() {
    let id = WorkOrderId::from_string("wko-abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefgh");
}

#[test]
fn suffix_without_dash_is_whole_id() {
    let id = ShortId::parse("nodash");
    assert_eq!(id.suffix(), "nodash");
}

#[test]
fn serde_is_transparent() {
    let id = WorkOrderId::from_string("wko-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"wko-xyz\"");
    let parsed: WorkOrderId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn deserializes_from_a_value_tree() {
    // Ids travel inside Value payloads (RPC bodies), not just raw JSON.
    let value = serde_json::json!({ "id": "wko-from-value" });
    let id: WorkOrderId = serde_json::from_value(value["id"].clone()).unwrap();
    assert_eq!(id.as_str(), "wko-from-value");
}

#[test]
fn ids_borrow_as_str_for_map_lookup() {
    use std::collections::HashMap;
    let id = WorkOrderId::from_string("wko-key");
    let mut map: HashMap<WorkOrderId, u32> = HashMap::new();
    map.insert(id, 7);
    assert_eq!(map.get("wko-key"), Some(&7));
}

#[test]
fn clip_backs_off_to_char_boundaries() {
    assert_eq!(clip("abcdef", 3), "abc");
    assert_eq!(clip("ab", 3), "ab");
    // 'é' is two bytes; clipping inside it retreats to the boundary.
    assert_eq!(clip("a\u{e9}b", 2), "a");
}
