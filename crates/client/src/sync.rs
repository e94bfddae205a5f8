// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine: ordered, de-duplicating drain of the queue.
//!
//! Each pass walks the queue in drain order (uploads, creations, updates,
//! derived work, deletions; ties by age). Per item:
//! - re-read it fresh, since earlier items may have rewritten it
//! - drop it if its retry budget is spent, without any network call
//! - skip it while it references an unresolved placeholder
//! - treat creations and uploads whose token is already mapped as done
//!
//! A connectivity failure ends the pass untouched. A hard failure bumps the
//! item's retry count and ends the pass so later items never overtake it.
//! A creation the server accepted is removed before its response is read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use outbox_core::{OperationKind, QueuedOperation};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{ApiRequest, Backend};
use crate::config::Config;
use crate::enqueue::extract_id;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, UploadOutcome};
use crate::remap::Remapper;
use crate::store::Store;

/// Counts from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped: usize,
    /// False when another pass was already running and this call did nothing.
    pub ran: bool,
}

/// How a single item ended.
enum Step {
    Done,
    TransformFailed(String),
    /// The server accepted a creation but returned no usable identifier.
    /// The entry is already gone so it is never sent twice.
    Unidentified(String),
}

/// Releases the sync lock when the pass ends, however it ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    store: Store,
    backend: Arc<dyn Backend>,
    pipeline: Arc<Pipeline>,
    remapper: Remapper,
    syncing: AtomicBool,
    item_delay: Duration,
    id_field: String,
}

impl SyncEngine {
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        pipeline: Arc<Pipeline>,
        config: &Config,
    ) -> Self {
        SyncEngine {
            remapper: Remapper::new(store.clone()),
            store,
            backend,
            pipeline,
            syncing: AtomicBool::new(false),
            item_delay: config.item_delay(),
            id_field: config.id_field.clone(),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Runs one pass. A call made while a pass is running returns at once
    /// with `ran == false`.
    pub async fn sync(&self) -> Result<SyncReport> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync already running");
            return Ok(SyncReport::default());
        }
        let _guard = SyncGuard(&self.syncing);

        let mut report = SyncReport {
            ran: true,
            ..SyncReport::default()
        };
        let ids = self.store.with(|db| db.pending_ids())?;
        debug!(pending = ids.len(), "sync pass started");

        for id in ids {
            let Some(op) = self.store.with(|db| db.get_op(id))? else {
                continue;
            };

            if op.is_exhausted() {
                self.drop_op(&op)?;
                report.failed += 1;
                continue;
            }

            if op.has_unresolved() {
                debug!(op_id = op.id, kind = %op.kind, waiting = ?op.unresolved(), "dependency not ready");
                report.skipped += 1;
                continue;
            }

            if self.already_applied(&op)? {
                report.synced += 1;
                continue;
            }

            match self.execute(&op).await {
                Ok(Step::Done) => {
                    debug!(op_id = op.id, kind = %op.kind, "synced");
                    report.synced += 1;
                    if !self.item_delay.is_zero() {
                        tokio::time::sleep(self.item_delay).await;
                    }
                }
                Ok(Step::Unidentified(message)) => {
                    warn!(op_id = op.id, error = %message, "creation accepted without an identifier");
                    report.failed += 1;
                }
                Ok(Step::TransformFailed(message)) => {
                    let retries = self.store.with(|db| db.record_failure(op.id, &message))?;
                    warn!(op_id = op.id, retries, error = %message, "deferred transform failed");
                    report.failed += 1;
                }
                Err(e) if e.is_connectivity() => {
                    info!(op_id = op.id, error = %e, "connectivity lost, ending pass");
                    break;
                }
                Err(e) => {
                    let retries = self
                        .store
                        .with(|db| db.record_failure(op.id, &e.to_string()))?;
                    warn!(op_id = op.id, kind = %op.kind, retries, error = %e, "sync item failed, ending pass");
                    report.failed += 1;
                    break;
                }
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Creations and uploads whose token is already mapped completed server-side
    /// before a crash; finish the bookkeeping without resubmitting.
    fn already_applied(&self, op: &QueuedOperation) -> Result<bool> {
        if !matches!(op.kind, OperationKind::Create | OperationKind::FileUpload) {
            return Ok(false);
        }
        let Some(token) = &op.token else {
            return Ok(false);
        };
        let Some(value) = self.remapper.lookup(token)? else {
            return Ok(false);
        };

        info!(op_id = op.id, %token, "already applied, removing without resubmitting");
        self.remapper.resolve(token, &value, &op.family)?;
        self.remove(op)?;
        Ok(true)
    }

    async fn execute(&self, op: &QueuedOperation) -> Result<Step> {
        match op.kind {
            OperationKind::FileUpload => match self.pipeline.process_upload(op).await? {
                UploadOutcome::Uploaded(_) => Ok(Step::Done),
                UploadOutcome::TransformFailed(e) => Ok(Step::TransformFailed(e.to_string())),
            },
            OperationKind::Create => {
                let token = op.token.as_ref().ok_or(Error::MissingToken)?;
                let response = self.backend.send(request_for(op)).await?;
                self.remove(op)?;
                match extract_id(&response, &self.id_field) {
                    Ok(id) => {
                        self.remapper.resolve(token, &id, &op.family)?;
                        Ok(Step::Done)
                    }
                    Err(e) => Ok(Step::Unidentified(e.to_string())),
                }
            }
            OperationKind::Update | OperationKind::Delete | OperationKind::Process => {
                self.backend.send(request_for(op)).await?;
                self.remove(op)?;
                Ok(Step::Done)
            }
        }
    }

    fn drop_op(&self, op: &QueuedOperation) -> Result<()> {
        warn!(
            op_id = op.id,
            kind = %op.kind,
            retries = op.retry_count,
            last_error = op.last_error.as_deref().unwrap_or(""),
            "retry budget exhausted, dropping"
        );
        self.remove(op)
    }

    /// Deletes the operation and any blob it owns.
    fn remove(&self, op: &QueuedOperation) -> Result<()> {
        let blob_ref = op.file.as_ref().map(|f| f.blob_ref);
        self.store.with(|db| {
            db.delete_op(op.id)?;
            if let Some(blob_ref) = blob_ref {
                db.delete_blob(blob_ref)?;
            }
            Ok(())
        })
    }
}

fn request_for(op: &QueuedOperation) -> ApiRequest {
    ApiRequest::new(op.method, &op.endpoint, &op.payload)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
