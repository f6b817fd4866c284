// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ids_are_unique() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
}

#[test]
fn id_parse_roundtrip() {
    let id = RequestId::new();
    let parsed = RequestId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn id_parse_rejects_garbage() {
    assert!(RequestId::parse("not-a-uuid").is_err());
}

#[test]
fn id_short_is_prefix() {
    let id = TaskId::new();
    let short = id.short();
    assert_eq!(short.len(), 8);
    assert!(id.to_string().starts_with(&short));
}

#[test]
fn id_serde_is_transparent() {
    let id = ScenarioId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id));

    let parsed: ScenarioId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn lock_id_free() {
    assert!(LockId::FREE.is_free());
    assert!(!LockId(7).is_free());
}
