// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client facade wiring the stores, backend, and sync machinery together.

use std::path::Path;
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::enqueue::{Enqueuer, Mutation, Outcome};
use crate::error::Result;
use crate::http::HttpBackend;
use crate::monitor::Monitor;
use crate::pipeline::{Attachment, Capture, Passthrough, Pipeline, Transcoder};
use crate::remap::Remapper;
use crate::store::Store;
use crate::sync::{SyncEngine, SyncReport};

/// Offline-capable client for the remote backend.
pub struct Outbox {
    store: Store,
    backend: Arc<dyn Backend>,
    connectivity: Connectivity,
    remapper: Remapper,
    pipeline: Arc<Pipeline>,
    enqueuer: Enqueuer,
    engine: Arc<SyncEngine>,
    poll_interval: std::time::Duration,
}

impl Outbox {
    /// Create a client with a custom backend and transcoder (for testing).
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        transcoder: Arc<dyn Transcoder>,
        connectivity: Connectivity,
        config: &Config,
    ) -> Self {
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            Arc::clone(&backend),
            transcoder,
            connectivity.clone(),
            config.max_retries,
        ));
        let enqueuer = Enqueuer::new(
            store.clone(),
            Arc::clone(&backend),
            Arc::clone(&pipeline),
            connectivity.clone(),
            config,
        );
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            Arc::clone(&backend),
            Arc::clone(&pipeline),
            config,
        ));
        Outbox {
            remapper: Remapper::new(store.clone()),
            store,
            backend,
            connectivity,
            pipeline,
            enqueuer,
            engine,
            poll_interval: config.poll_interval(),
        }
    }

    /// Open the configured database and talk to the configured HTTP backend.
    ///
    /// Starts offline; callers or a health probe report connectivity.
    pub fn open(config: &Config, config_path: &Path) -> Result<Self> {
        let store = Store::open(&config.database_path(config_path))?;
        let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
        Ok(Self::new(
            store,
            backend,
            Arc::new(Passthrough),
            Connectivity::new(false),
            config,
        ))
    }

    pub async fn enqueue_and_attempt(&self, mutation: Mutation) -> Result<Outcome> {
        self.enqueuer.enqueue_and_attempt(mutation).await
    }

    pub async fn capture_and_queue_upload(
        &self,
        family: &str,
        attachment: Attachment,
    ) -> Result<Capture> {
        self.pipeline
            .capture_and_queue_upload(family, attachment)
            .await
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        self.engine.sync().await
    }

    /// Builds the observability surface for this client.
    pub fn monitor(&self) -> Monitor {
        Monitor::new(
            Arc::clone(&self.engine),
            self.store.clone(),
            self.connectivity.clone(),
            self.poll_interval,
        )
    }

    /// Like [`Outbox::monitor`], deriving connectivity from backend health.
    pub fn probing_monitor(&self) -> Monitor {
        self.monitor().with_health_probe(Arc::clone(&self.backend))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn remapper(&self) -> &Remapper {
        &self.remapper
    }

    pub fn is_syncing(&self) -> bool {
        self.engine.is_syncing()
    }
}
