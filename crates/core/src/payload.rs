// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Structured request bodies with typed placeholder slots.
//!
//! A [`Payload`] is an opaque JSON document plus a map of JSON pointers to the
//! [`Ref`]s found at those positions. Slots are discovered once, when the
//! payload is built, by looking for string leaves that are placeholders.
//! Remapping then only touches those slots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::token::{Ref, Token};

/// Client-side bookkeeping fields never sent to the backend.
pub const VOLATILE_FIELDS: [&str; 2] = ["_tempId", "_queued"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    body: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    slots: BTreeMap<String, Ref>,
}

impl Payload {
    /// Wraps a JSON body, recording every placeholder leaf as a slot.
    ///
    /// Volatile fields are skipped: `_tempId` carries an operation's own
    /// correlation token, not a dependency.
    pub fn new(body: Value) -> Self {
        let mut slots = BTreeMap::new();
        collect_slots(&body, &mut String::new(), &mut slots);
        Payload { body, slots }
    }

    /// An empty JSON object.
    pub fn empty() -> Self {
        Payload::new(Value::Object(Map::new()))
    }

    /// The stored body, volatile fields included.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn slots(&self) -> &BTreeMap<String, Ref> {
        &self.slots
    }

    /// Looks up a top-level field of the body.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Returns the tokens still waiting for a real value.
    pub fn unresolved(&self) -> impl Iterator<Item = &Token> {
        self.slots.values().filter_map(Ref::token)
    }

    /// Rewrites every slot holding `token`. Returns true if anything changed.
    pub fn resolve(&mut self, token: &Token, value: &str) -> bool {
        let mut changed = false;
        for (pointer, slot) in &mut self.slots {
            if slot.resolve(token, value) {
                if let Some(leaf) = self.body.pointer_mut(pointer) {
                    *leaf = Value::String(value.to_string());
                }
                changed = true;
            }
        }
        changed
    }

    /// The body as it goes over the wire: volatile fields stripped.
    pub fn render(&self) -> Value {
        let mut body = self.body.clone();
        strip_volatile(&mut body);
        body
    }
}

impl From<Value> for Payload {
    fn from(body: Value) -> Self {
        Payload::new(body)
    }
}

/// Removes volatile fields at any depth.
pub fn strip_volatile(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for field in VOLATILE_FIELDS {
                map.remove(field);
            }
            map.values_mut().for_each(strip_volatile);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_volatile),
        _ => {}
    }
}

fn collect_slots(value: &Value, pointer: &mut String, slots: &mut BTreeMap<String, Ref>) {
    match value {
        Value::String(s) => {
            if let Ok(token) = Token::parse(s) {
                slots.insert(pointer.clone(), Ref::Temp(token));
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                if VOLATILE_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&escape_pointer(key));
                collect_slots(child, pointer, slots);
                pointer.truncate(len);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&i.to_string());
                collect_slots(child, pointer, slots);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}

/// Escapes a key for use in a JSON pointer (RFC 6901).
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
