// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Binary transform-then-upload pipeline.
//!
//! Captured bytes are persisted before anything else happens. The transform
//! runs once at capture time; if it fails the upload operation stays in
//! [`UploadStage::AwaitingTransform`] and the sync engine retries it, at most
//! once per pass, within the operation's retry budget. A successful transform
//! is written back in place and never redone. Signed destinations are always
//! requested at the moment of upload.

use std::sync::Arc;

use outbox_core::{
    FileInfo, Method, NewOperation, OperationKind, QueuedOperation, StoredBlob, Token, UploadStage,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::{Backend, UploadRequest};
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::remap::Remapper;
use crate::store::Store;

/// Resource type recorded for resolved storage paths.
pub const PATH_RESOURCE: &str = "path";

/// Format conversion failed. Always treated as retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transform failed: {0}")]
pub struct TransformError(pub String);

/// Output of a successful transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// Converts captured bytes into their upload format.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, blob: &StoredBlob) -> std::result::Result<Transcoded, TransformError>;
}

/// Uploads bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transcoder for Passthrough {
    fn transcode(&self, blob: &StoredBlob) -> std::result::Result<Transcoded, TransformError> {
        Ok(Transcoded {
            bytes: blob.bytes.clone(),
            file_name: blob.file_name.clone(),
            mime_type: blob.mime_type.clone(),
        })
    }
}

/// Binary content handed over at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Attachment {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Result of [`Pipeline::capture_and_queue_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Path placeholder other operations can reference until upload.
    pub placeholder: Token,
    /// Real storage path, when the upload completed at capture time.
    pub storage_path: Option<String>,
    pub queued: bool,
}

impl Capture {
    /// The path callers should embed: the real one if known, else the placeholder.
    pub fn path(&self) -> &str {
        self.storage_path
            .as_deref()
            .unwrap_or_else(|| self.placeholder.as_str())
    }

    /// JSON body handed back to enqueue callers.
    pub fn to_json(&self) -> Value {
        let mut body = json!({ "path": self.path() });
        if self.queued {
            body["queued"] = Value::Bool(true);
        }
        body
    }
}

/// What happened to an upload processed during sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Bytes landed at this storage path; the operation and blob are gone.
    Uploaded(String),
    /// The deferred transform failed again; nothing was sent.
    TransformFailed(TransformError),
}

pub struct Pipeline {
    store: Store,
    backend: Arc<dyn Backend>,
    transcoder: Arc<dyn Transcoder>,
    remapper: Remapper,
    connectivity: Connectivity,
    max_retries: u32,
}

impl Pipeline {
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        transcoder: Arc<dyn Transcoder>,
        connectivity: Connectivity,
        max_retries: u32,
    ) -> Self {
        Pipeline {
            remapper: Remapper::new(store.clone()),
            store,
            backend,
            transcoder,
            connectivity,
            max_retries,
        }
    }

    /// Persists captured bytes, transforms them once, and uploads if online.
    ///
    /// Upload failures at capture time never surface: the item stays queued.
    pub async fn capture_and_queue_upload(
        &self,
        family: &str,
        attachment: Attachment,
    ) -> Result<Capture> {
        let placeholder = Token::generate(PATH_RESOURCE);
        let size = attachment.bytes.len() as u64;
        let op_id = self.store.with(|db| {
            let blob_ref =
                db.insert_blob(&attachment.bytes, &attachment.file_name, &attachment.mime_type)?;
            let draft = NewOperation::new(
                OperationKind::FileUpload,
                family,
                Method::Put,
                format!("/{family}").as_str(),
                json!({
                    "fileName": attachment.file_name,
                    "fileType": attachment.mime_type,
                    "fileSize": size,
                }),
            )
            .with_token(placeholder.clone())
            .with_max_retries(self.max_retries)
            .with_file(FileInfo {
                blob_ref,
                file_name: attachment.file_name.clone(),
                file_type: attachment.mime_type.clone(),
                file_size: size,
                stage: UploadStage::AwaitingTransform,
            });
            db.insert_op(&draft)
        })?;
        debug!(op_id, token = %placeholder, size, "capture persisted");

        let queued = Capture {
            placeholder: placeholder.clone(),
            storage_path: None,
            queued: true,
        };

        if let Err(e) = self.transform(op_id)? {
            warn!(op_id, error = %e, "transform deferred to sync");
            return Ok(queued);
        }

        if !self.connectivity.is_online() {
            return Ok(queued);
        }

        match self.upload(op_id).await {
            Ok(path) => Ok(Capture {
                placeholder,
                storage_path: Some(path),
                queued: false,
            }),
            Err(Error::Core(e)) => Err(Error::Core(e)),
            Err(e) => {
                warn!(op_id, error = %e, "upload left queued");
                Ok(queued)
            }
        }
    }

    /// Runs the remaining pipeline steps for a queued upload during sync.
    ///
    /// Backend errors propagate so the caller can classify them.
    pub async fn process_upload(&self, op: &QueuedOperation) -> Result<UploadOutcome> {
        if let Err(e) = self.transform(op.id)? {
            return Ok(UploadOutcome::TransformFailed(e));
        }
        Ok(UploadOutcome::Uploaded(self.upload(op.id).await?))
    }

    /// Transforms the blob in place if the operation still awaits it.
    ///
    /// The outer result carries store errors, the inner one the transform result.
    fn transform(&self, op_id: i64) -> Result<std::result::Result<(), TransformError>> {
        let (op, blob) = self.load(op_id)?;
        let Some(file) = op.file else {
            return Err(Error::MissingAttachment);
        };
        if file.stage == UploadStage::ReadyToUpload {
            return Ok(Ok(()));
        }

        let transcoded = match self.transcoder.transcode(&blob) {
            Ok(t) => t,
            Err(e) => return Ok(Err(e)),
        };

        let ready = FileInfo {
            blob_ref: file.blob_ref,
            file_name: transcoded.file_name.clone(),
            file_type: transcoded.mime_type.clone(),
            file_size: transcoded.bytes.len() as u64,
            stage: UploadStage::ReadyToUpload,
        };
        self.store.with(|db| {
            db.replace_blob(
                file.blob_ref,
                &transcoded.bytes,
                &transcoded.file_name,
                &transcoded.mime_type,
            )?;
            db.update_op_file(op_id, &ready)
        })?;
        debug!(op_id, size = ready.file_size, "transform stored");
        Ok(Ok(()))
    }

    /// Requests a fresh destination, sends the bytes, and resolves the placeholder.
    async fn upload(&self, op_id: i64) -> Result<String> {
        let (op, blob) = self.load(op_id)?;
        let token = op.token.clone().ok_or(Error::MissingToken)?;

        let destination = self
            .backend
            .request_upload(UploadRequest {
                family: op.family.clone(),
                file_name: blob.file_name.clone(),
                mime_type: blob.mime_type.clone(),
                size: blob.size(),
            })
            .await?;
        self.backend
            .put_bytes(&destination, blob.bytes, &blob.mime_type)
            .await?;

        // Mapping first, so a crash before cleanup is caught by the dedupe guard.
        self.remapper
            .resolve(&token, &destination.path, PATH_RESOURCE)?;
        self.store.with(|db| {
            db.delete_op(op_id)?;
            db.delete_blob(blob.id)
        })?;
        info!(op_id, %token, path = %destination.path, "upload complete");
        Ok(destination.path)
    }

    fn load(&self, op_id: i64) -> Result<(QueuedOperation, StoredBlob)> {
        self.store.with(|db| {
            let op = db
                .get_op(op_id)?
                .ok_or(outbox_core::Error::OperationNotFound(op_id))?;
            let blob_ref = op.file.as_ref().map(|f| f.blob_ref).unwrap_or_default();
            let blob = db
                .get_blob(blob_ref)?
                .ok_or(outbox_core::Error::BlobNotFound(blob_ref))?;
            Ok((op, blob))
        })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
