// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier and path remapping.
//!
//! When a creation or upload completes, its placeholder gets a real value.
//! [`Remapper::resolve`] records that once and rewrites every queued
//! operation still holding the placeholder. Re-running it is a no-op because
//! rewritten refs are no longer `Temp`.

use outbox_core::{NewOperation, Token};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::Store;

#[derive(Clone)]
pub struct Remapper {
    store: Store,
}

impl Remapper {
    pub fn new(store: Store) -> Self {
        Remapper { store }
    }

    /// Records `token -> value` and rewrites every queued reference to it.
    ///
    /// The first mapping recorded for a token wins; later calls rewrite with
    /// the stored value. Returns the number of operations rewritten.
    pub fn resolve(&self, token: &Token, value: &str, resource_type: &str) -> Result<usize> {
        let inserted = self
            .store
            .with(|db| db.insert_mapping(token, value, resource_type))?;
        let value = match self.lookup(token)? {
            Some(stored) => stored,
            None => value.to_string(),
        };
        if !inserted {
            debug!(%token, value = %value, "mapping already recorded");
        }

        let rewritten = self.store.with(|db| {
            let mut rewritten = 0;
            for mut op in db.list_ops()? {
                if op.resolve(token, &value) {
                    db.update_op_refs(&op)?;
                    rewritten += 1;
                }
            }
            Ok(rewritten)
        })?;

        info!(%token, value = %value, rewritten, "placeholder resolved");
        Ok(rewritten)
    }

    /// Returns the resolved value for a token, if one is recorded.
    pub fn lookup(&self, token: &Token) -> Result<Option<String>> {
        Ok(self
            .store
            .with(|db| db.get_mapping(token))?
            .map(|m| m.resolved_value))
    }

    /// Applies every already-recorded mapping to a draft before it is persisted.
    pub fn resolve_known(&self, op: &mut NewOperation) -> Result<usize> {
        let mut applied = 0;
        for token in op.unresolved() {
            if let Some(value) = self.lookup(&token)? {
                if op.resolve(&token, &value) {
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
#[path = "remap_tests.rs"]
mod tests;
