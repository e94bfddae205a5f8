// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::backend::BackendError;
use crate::pipeline::TransformError;

/// All possible errors surfaced by the outbox client.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] outbox_core::Error),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The backend refused the request at enqueue time; the queued copy was removed.
    #[error("request rejected: {0}")]
    Rejected(BackendError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("create operations require a correlation token")]
    MissingToken,

    #[error("file uploads require a binary attachment")]
    MissingAttachment,

    #[error("response is missing identifier field '{field}'")]
    MissingIdentifier { field: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the error is a transport-level connectivity failure.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Backend(e) if e.is_connectivity())
    }
}

/// Result type for outbox client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
