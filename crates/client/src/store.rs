// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared handle to the durable stores.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use outbox_core::Database;

use crate::error::Result;

/// Cloneable handle shared by the enqueuer, pipeline, remapper, and sync engine.
///
/// The lock is only held inside [`Store::with`], which takes a synchronous
/// closure, so it can never be held across an `.await`.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Store {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Runs one store interaction under the lock.
    pub fn with<T>(&self, f: impl FnOnce(&Database) -> outbox_core::Result<T>) -> Result<T> {
        // Poisoning is ignored: every statement commits atomically.
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&db)?)
    }
}
