// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Backend abstraction for the remote CRUD service.
//!
//! Provides a trait-based seam so that:
//! - [`crate::http::HttpBackend`] talks to a real server
//! - test doubles can count and script every call

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use outbox_core::{Endpoint, Method, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for backend calls, classified at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never reached the server or no response came back.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The server answered with a non-success status.
    #[error("status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The server answered but the body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Connectivity(_))
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// A rendered JSON request, with every placeholder already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Value,
}

impl ApiRequest {
    /// Renders an endpoint and payload into a sendable request.
    ///
    /// Volatile bookkeeping fields are stripped from the body.
    pub fn new(method: Method, endpoint: &Endpoint, payload: &Payload) -> Self {
        ApiRequest {
            method,
            path: endpoint.render(),
            body: payload.render(),
        }
    }
}

/// Request for a short-lived signed upload destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub family: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
}

/// A pre-authorized target for direct binary upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedUpload {
    /// Where to PUT the bytes.
    pub url: String,
    /// The storage path the bytes will live at once uploaded.
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Backend trait for the remote CRUD service.
///
/// Methods return boxed futures so the trait stays object safe.
pub trait Backend: Send + Sync {
    /// Send a JSON request and return the decoded response body.
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<Value>> + Send + '_>>;

    /// Ask for a fresh signed destination. Never cached by callers.
    fn request_upload(
        &self,
        request: UploadRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<SignedUpload>> + Send + '_>>;

    /// Transfer bytes to a signed destination.
    fn put_bytes<'a>(
        &'a self,
        destination: &'a SignedUpload,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + 'a>>;

    /// Cheap reachability check.
    fn health(&self) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + '_>>;
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
