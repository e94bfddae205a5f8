// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for outbox-core operations.

use thiserror::Error;

/// All possible errors that can occur in the durable stores and data model.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queued operation not found: {0}")]
    OperationNotFound(i64),

    #[error("stored blob not found: {0}")]
    BlobNotFound(i64),

    #[error("invalid placeholder token: '{0}'\n  hint: placeholders start with 'temp_'")]
    InvalidToken(String),

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete, file_upload, process")]
    InvalidKind(String),

    #[error("invalid method: '{0}'\n  hint: valid methods are: GET, POST, PUT, PATCH, DELETE")]
    InvalidMethod(String),

    #[error("invalid upload stage: '{0}'")]
    InvalidStage(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for outbox-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
