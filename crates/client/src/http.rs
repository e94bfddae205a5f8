// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of the [`Backend`] seam using `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use outbox_core::Method;
use serde_json::{json, Value};

use crate::backend::{ApiRequest, Backend, BackendError, BackendResult, SignedUpload, UploadRequest};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// JSON-over-HTTP backend with optional bearer authentication.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

trait WithAuth {
    fn with_auth(self, token: Option<&str>) -> Self;
}

impl WithAuth for reqwest::RequestBuilder {
    fn with_auth(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.bearer_auth(token),
            None => self,
        }
    }
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpBackend { client, config })
    }

    /// Joins an API path onto the configured base URL.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.url(path);
        let builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };
        builder.with_auth(self.config.auth_token.as_deref())
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Maps a transport error to the connectivity/decode split.
fn classify(err: reqwest::Error) -> BackendError {
    if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else if err.is_builder() || err.is_redirect() {
        // malformed request or redirect loop; retrying cannot help
        BackendError::Rejected {
            status: 0,
            message: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        BackendError::Rejected {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        // connect, timeout, request, and body errors never got a response
        BackendError::Connectivity(err.to_string())
    }
}

/// Turns a non-success response into a `Rejected` error carrying its body.
async fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Decodes a response body, treating an empty body as JSON null.
async fn decode_body(response: reqwest::Response) -> BackendResult<Value> {
    let bytes = response.bytes().await.map_err(classify)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

impl Backend for HttpBackend {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<Value>> + Send + '_>> {
        Box::pin(async move {
            let mut builder = self.request(request.method, &request.path);
            if !request.body.is_null() {
                builder = builder.json(&request.body);
            }
            let response = builder.send().await.map_err(classify)?;
            let response = check_status(response).await?;
            decode_body(response).await
        })
    }

    fn request_upload(
        &self,
        request: UploadRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<SignedUpload>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .request(Method::Post, &self.config.sign_endpoint)
                .json(&json!({
                    "family": request.family,
                    "fileName": request.file_name,
                    "mimeType": request.mime_type,
                    "size": request.size,
                }))
                .send()
                .await
                .map_err(classify)?;
            let response = check_status(response).await?;
            response.json::<SignedUpload>().await.map_err(classify)
        })
    }

    fn put_bytes<'a>(
        &'a self,
        destination: &'a SignedUpload,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + 'a>> {
        Box::pin(async move {
            // Signed URLs carry their own authorization.
            let mut builder = self
                .client
                .put(&destination.url)
                .header(reqwest::header::CONTENT_TYPE, mime_type);
            for (name, value) in &destination.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let response = builder.body(bytes).send().await.map_err(classify)?;
            check_status(response).await?;
            Ok(())
        })
    }

    fn health(&self) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .request(Method::Get, &self.config.health_endpoint)
                .send()
                .await
                .map_err(classify)?;
            check_status(response).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
