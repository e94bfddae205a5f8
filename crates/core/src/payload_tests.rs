// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;

fn token(s: &str) -> Token {
    Token::parse(s).unwrap()
}

#[test]
fn placeholder_leaves_become_slots() {
    let payload = Payload::new(json!({
        "visit_id": "temp_visit_1",
        "title": "Checkup",
        "attachments": [{ "path": "temp_path_9" }],
    }));

    let pointers: Vec<_> = payload.slots().keys().cloned().collect();
    assert_eq!(pointers, vec!["/attachments/0/path", "/visit_id"]);
    assert_eq!(payload.unresolved().count(), 2);
}

#[test]
fn volatile_fields_are_not_dependencies() {
    let payload = Payload::new(json!({ "_tempId": "temp_visit_1", "status": "draft" }));
    assert!(payload.slots().is_empty());
}

#[test]
fn keys_with_slashes_are_escaped() {
    let mut payload = Payload::new(json!({ "a/b": { "c~d": "temp_x_1" } }));
    assert!(payload.slots().contains_key("/a~1b/c~0d"));

    assert!(payload.resolve(&token("temp_x_1"), "real"));
    assert_eq!(payload.body()["a/b"]["c~d"], "real");
}

#[test]
fn resolve_rewrites_body_and_slot() {
    let mut payload = Payload::new(json!({ "visit_id": "temp_visit_1", "note": "temp_visit_1 text" }));

    assert!(payload.resolve(&token("temp_visit_1"), "v-100"));
    assert_eq!(payload.get("visit_id"), Some(&json!("v-100")));
    // Free text is not a slot and is left alone.
    assert_eq!(payload.get("note"), Some(&json!("temp_visit_1 text")));
    assert_eq!(payload.unresolved().count(), 0);

    let snapshot = payload.clone();
    assert!(!payload.resolve(&token("temp_visit_1"), "v-100"));
    assert_eq!(payload, snapshot);
}

#[test]
fn render_strips_volatile_fields_at_any_depth() {
    let payload = Payload::new(json!({
        "_tempId": "temp_visit_1",
        "_queued": true,
        "status": "draft",
        "items": [{ "_queued": true, "name": "a" }],
    }));

    assert_eq!(
        payload.render(),
        json!({ "status": "draft", "items": [{ "name": "a" }] })
    );
    // The stored body keeps them.
    assert_eq!(payload.get("_tempId"), Some(&json!("temp_visit_1")));
}

#[test]
fn payload_serde_keeps_slots() {
    let payload = Payload::new(json!({ "visit_id": "temp_visit_1" }));
    let json = serde_json::to_string(&payload).unwrap();
    let back: Payload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
}
