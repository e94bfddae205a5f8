// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued operations: pending effects against the remote backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::token::Token;

/// Default retry budget for a queued operation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a queued operation does to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Creates a resource; carries a correlation token.
    Create,
    /// Modifies an existing resource.
    Update,
    /// Removes a resource.
    Delete,
    /// Uploads a stored blob to a signed destination.
    FileUpload,
    /// Derived work on a resource, e.g. processing a just-updated path.
    Process,
}

impl OperationKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::FileUpload => "file_upload",
            OperationKind::Process => "process",
        }
    }

    /// Position in the sync drain order (lower drains first).
    ///
    /// Uploads come first so their paths resolve, creations before updates,
    /// updates before derived work, deletions last.
    pub fn drain_rank(&self) -> u8 {
        match self {
            OperationKind::FileUpload => 0,
            OperationKind::Create => 1,
            OperationKind::Update => 2,
            OperationKind::Process => 3,
            OperationKind::Delete => 4,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            "file_upload" => Ok(OperationKind::FileUpload),
            "process" => Ok(OperationKind::Process),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// HTTP method of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// Where a file upload stands in the transform-then-upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    /// The stored blob is raw; the transform must run before uploading.
    AwaitingTransform,
    /// The stored blob holds the final bytes.
    ReadyToUpload,
}

impl UploadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStage::AwaitingTransform => "awaiting_transform",
            UploadStage::ReadyToUpload => "ready_to_upload",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UploadStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "awaiting_transform" => Ok(UploadStage::AwaitingTransform),
            "ready_to_upload" => Ok(UploadStage::ReadyToUpload),
            _ => Err(Error::InvalidStage(s.to_string())),
        }
    }
}

/// File metadata carried by upload operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub blob_ref: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub stage: UploadStage,
}

/// An operation about to be persisted (no row id yet).
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    /// Resource family, e.g. `"visit"`.
    pub family: String,
    pub endpoint: Endpoint,
    pub method: Method,
    pub payload: Payload,
    /// Correlation token (creations) or path placeholder (uploads).
    pub token: Option<Token>,
    pub max_retries: u32,
    pub file: Option<FileInfo>,
}

impl NewOperation {
    pub fn new(
        kind: OperationKind,
        family: impl Into<String>,
        method: Method,
        endpoint: impl Into<Endpoint>,
        payload: impl Into<Payload>,
    ) -> Self {
        NewOperation {
            kind,
            family: family.into(),
            endpoint: endpoint.into(),
            method,
            payload: payload.into(),
            token: None,
            max_retries: DEFAULT_MAX_RETRIES,
            file: None,
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_file(mut self, file: FileInfo) -> Self {
        self.file = Some(file);
        self
    }

    /// Rewrites `token` in the endpoint and payload. Returns true on change.
    pub fn resolve(&mut self, token: &Token, value: &str) -> bool {
        let endpoint = self.endpoint.resolve(token, value);
        let payload = self.payload.resolve(token, value);
        endpoint || payload
    }

    /// Dependency tokens still unresolved.
    pub fn unresolved(&self) -> Vec<Token> {
        self.endpoint
            .unresolved()
            .chain(self.payload.unresolved())
            .cloned()
            .collect()
    }
}

/// A persisted pending operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedOperation {
    /// Local durable-store key.
    pub id: i64,
    pub kind: OperationKind,
    pub family: String,
    pub endpoint: Endpoint,
    pub method: Method,
    pub payload: Payload,
    pub token: Option<Token>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub file: Option<FileInfo>,
    pub last_error: Option<String>,
}

impl QueuedOperation {
    /// Returns true if any endpoint segment or payload slot is a placeholder.
    pub fn has_unresolved(&self) -> bool {
        self.endpoint.unresolved().next().is_some() || self.payload.unresolved().next().is_some()
    }

    /// Dependency tokens still unresolved.
    pub fn unresolved(&self) -> Vec<Token> {
        self.endpoint
            .unresolved()
            .chain(self.payload.unresolved())
            .cloned()
            .collect()
    }

    /// Rewrites `token` in the endpoint and payload. Returns true on change.
    pub fn resolve(&mut self, token: &Token, value: &str) -> bool {
        let endpoint = self.endpoint.resolve(token, value);
        let payload = self.payload.resolve(token, value);
        endpoint || payload
    }

    /// Returns true once the retry budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Sort key for the sync drain order.
    pub fn drain_key(&self) -> (u8, DateTime<Utc>, i64) {
        (self.kind.drain_rank(), self.created_at, self.id)
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
