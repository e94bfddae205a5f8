// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! outbox-core: durable model and stores for the offline mutation queue
//!
//! This crate provides the queued operation model, typed placeholder
//! references, and the SQLite-backed queue, blob, and mapping stores used by
//! the `outbox` client.

pub mod blob;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod op;
pub mod payload;
pub mod token;

pub use blob::{IdentifierMapping, StoredBlob};
pub use db::Database;
pub use endpoint::{Endpoint, Segment};
pub use error::{Error, Result};
pub use op::{FileInfo, Method, NewOperation, OperationKind, QueuedOperation, UploadStage};
pub use payload::Payload;
pub use token::{Ref, Token};
