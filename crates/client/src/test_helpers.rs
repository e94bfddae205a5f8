// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles: a counting backend and a scriptable transcoder.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use outbox_core::{Method, StoredBlob};
use serde_json::{json, Value};

use crate::backend::{ApiRequest, Backend, BackendError, BackendResult, SignedUpload, UploadRequest};
use crate::client::Outbox;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::pipeline::{Transcoded, Transcoder, TransformError};
use crate::store::Store;

#[derive(Default)]
struct MockState {
    /// Every request passed to send(), in order.
    sent: Vec<ApiRequest>,
    upload_requests: Vec<UploadRequest>,
    puts: Vec<(SignedUpload, Vec<u8>)>,
    health_calls: usize,
    /// Scripted send() results, consumed before the default behaviour.
    responses: VecDeque<BackendResult<Value>>,
    put_failures: VecDeque<BackendError>,
    unreachable: bool,
    next_id: usize,
}

/// Backend double that records and counts every call.
///
/// By default a `POST` answers with its body plus a fresh `id` (`srv-1`,
/// `srv-2`, ...), other methods echo the body, and uploads succeed with a
/// unique signed destination.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a connectivity error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Queues a result for the next send().
    pub fn push_response(&self, response: BackendResult<Value>) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    pub fn reject_next(&self, status: u16) {
        self.push_response(Err(BackendError::Rejected {
            status,
            message: "scripted rejection".to_string(),
        }));
    }

    pub fn fail_next_put(&self, error: BackendError) {
        self.state.lock().unwrap().put_failures.push_back(error);
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_to(&self, method: Method, path: &str) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn upload_requests(&self) -> usize {
        self.state.lock().unwrap().upload_requests.len()
    }

    pub fn puts(&self) -> Vec<(SignedUpload, Vec<u8>)> {
        self.state.lock().unwrap().puts.clone()
    }

    /// Every call made to the backend except health checks.
    pub fn network_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.sent.len() + state.upload_requests.len() + state.puts.len()
    }

    pub fn health_calls(&self) -> usize {
        self.state.lock().unwrap().health_calls
    }

    fn unreachable_error() -> BackendError {
        BackendError::Connectivity("network unreachable".to_string())
    }
}

impl Backend for MockBackend {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<Value>> + Send + '_>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            state.sent.push(request.clone());
            if state.unreachable {
                return Err(Self::unreachable_error());
            }
            if let Some(response) = state.responses.pop_front() {
                return response;
            }
            if request.method == Method::Post {
                state.next_id += 1;
                let mut body = match request.body {
                    Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                body.insert("id".to_string(), json!(format!("srv-{}", state.next_id)));
                return Ok(Value::Object(body));
            }
            Ok(request.body)
        })
    }

    fn request_upload(
        &self,
        request: UploadRequest,
    ) -> Pin<Box<dyn Future<Output = BackendResult<SignedUpload>> + Send + '_>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            state.upload_requests.push(request.clone());
            if state.unreachable {
                return Err(Self::unreachable_error());
            }
            let n = state.upload_requests.len();
            Ok(SignedUpload {
                url: format!("https://storage.test/signed/{n}?sig=abc"),
                path: format!("{}/{}-{}", request.family, n, request.file_name),
                headers: Default::default(),
            })
        })
    }

    fn put_bytes<'a>(
        &'a self,
        destination: &'a SignedUpload,
        bytes: Vec<u8>,
        _mime_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + 'a>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            state.puts.push((destination.clone(), bytes));
            if state.unreachable {
                return Err(Self::unreachable_error());
            }
            match state.put_failures.pop_front() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn health(&self) -> Pin<Box<dyn Future<Output = BackendResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.health_calls += 1;
            if state.unreachable {
                Err(Self::unreachable_error())
            } else {
                Ok(())
            }
        })
    }
}

/// Transcoder double that counts invocations and fails a scripted number of times.
#[derive(Default)]
pub struct MockTranscoder {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` calls.
    pub fn failing(n: usize) -> Self {
        MockTranscoder {
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(n),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for MockTranscoder {
    fn transcode(&self, blob: &StoredBlob) -> Result<Transcoded, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransformError("encoder unavailable".to_string()));
        }
        let stem = blob
            .file_name
            .rsplit_once('.')
            .map_or(blob.file_name.as_str(), |(stem, _)| stem);
        let mut bytes = b"mp3:".to_vec();
        bytes.extend_from_slice(&blob.bytes);
        Ok(Transcoded {
            bytes,
            file_name: format!("{stem}.mp3"),
            mime_type: "audio/mpeg".to_string(),
        })
    }
}

/// Config with no pacing delay so tests run instantly.
pub fn test_config() -> Config {
    Config {
        item_delay_ms: 0,
        ..Config::default()
    }
}

/// An in-memory client wired to counting doubles.
pub struct Harness {
    pub outbox: Outbox,
    pub backend: Arc<MockBackend>,
    pub transcoder: Arc<MockTranscoder>,
}

impl Harness {
    pub fn new(online: bool) -> Self {
        Self::with_transcoder(online, MockTranscoder::new())
    }

    pub fn with_transcoder(online: bool, transcoder: MockTranscoder) -> Self {
        let backend = Arc::new(MockBackend::new());
        let transcoder = Arc::new(transcoder);
        let outbox = Outbox::new(
            Store::open_in_memory().unwrap(),
            Arc::clone(&backend) as Arc<dyn Backend>,
            Arc::clone(&transcoder) as Arc<dyn Transcoder>,
            Connectivity::new(online),
            &test_config(),
        );
        Harness {
            outbox,
            backend,
            transcoder,
        }
    }

    pub fn store(&self) -> &Store {
        self.outbox.store()
    }

    pub fn pending(&self) -> usize {
        self.store().with(|db| db.count_ops()).unwrap()
    }

    pub fn blobs(&self) -> usize {
        self.store().with(|db| db.count_blobs()).unwrap()
    }

    pub fn set_online(&self, online: bool) {
        self.outbox.connectivity().set_online(online);
    }
}
