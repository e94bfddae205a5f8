// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity listener and observability surface.
//!
//! The [`Monitor`] owns the event loop that drives automatic syncing: once on
//! start if already online, then on every offline-to-online transition. It
//! also publishes a [`Status`] snapshot whose pending count is refreshed on a
//! poll interval and right after each sync, so it is eventually consistent
//! rather than push-consistent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::store::Store;
use crate::sync::{SyncEngine, SyncReport};

/// Snapshot exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub online: bool,
    pub syncing: bool,
    pub pending: usize,
    pub last_report: Option<SyncReport>,
}

pub struct Monitor {
    engine: Arc<SyncEngine>,
    store: Store,
    connectivity: Connectivity,
    poll_interval: Duration,
    /// Backend probed on each poll tick to derive the online flag.
    probe: Option<Arc<dyn Backend>>,
    pending: AtomicUsize,
    status: watch::Sender<Status>,
}

impl Monitor {
    pub fn new(
        engine: Arc<SyncEngine>,
        store: Store,
        connectivity: Connectivity,
        poll_interval: Duration,
    ) -> Self {
        let (status, _rx) = watch::channel(Status {
            online: connectivity.is_online(),
            ..Status::default()
        });
        Monitor {
            engine,
            store,
            connectivity,
            poll_interval,
            probe: None,
            pending: AtomicUsize::new(0),
            status,
        }
    }

    /// Derive connectivity from backend health checks on every poll tick.
    pub fn with_health_probe(mut self, backend: Arc<dyn Backend>) -> Self {
        self.probe = Some(backend);
        self
    }

    /// Cached pending count; see [`Monitor::refresh_pending`].
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.engine.is_syncing()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Reports a connectivity change. The run loop reacts to transitions.
    pub fn set_online(&self, online: bool) {
        if self.connectivity.set_online(online) {
            info!(online, "connectivity changed");
        }
        self.publish(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Re-reads the queue size into the cached count.
    pub fn refresh_pending(&self) -> Result<usize> {
        let pending = self.store.with(|db| db.count_ops())?;
        self.pending.store(pending, Ordering::Release);
        self.publish(None);
        Ok(pending)
    }

    /// Manual trigger: runs one pass and refreshes the pending count.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.status.send_modify(|status| status.syncing = true);
        let result = self.engine.sync().await;
        self.refresh_pending()?;
        let report = result?;
        if report.ran {
            self.publish(Some(report));
        }
        Ok(report)
    }

    /// Checks backend health and records the result as the online flag.
    ///
    /// Without a configured probe this only reports the current flag.
    pub async fn probe(&self) -> bool {
        let Some(backend) = &self.probe else {
            return self.is_online();
        };
        let online = match backend.health().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        };
        self.set_online(online);
        online
    }

    /// Event loop: syncs on start if online and on every transition to
    /// online, refreshes the pending count on each tick, and exits when
    /// `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();

        self.refresh_pending()?;
        if was_online {
            self.trigger().await;
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("monitor cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if self.probe.is_some() {
                        self.probe().await;
                    }
                    if let Err(e) = self.refresh_pending() {
                        warn!(error = %e, "failed to refresh pending count");
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online && !was_online {
                        info!("back online, syncing");
                        self.trigger().await;
                    }
                    was_online = online;
                }
            }
        }
        Ok(())
    }

    async fn trigger(&self) {
        if let Err(e) = self.sync().await {
            warn!(error = %e, "sync failed");
        }
    }

    fn publish(&self, report: Option<SyncReport>) {
        let online = self.connectivity.is_online();
        let syncing = self.engine.is_syncing();
        let pending = self.pending_count();
        self.status.send_modify(|status| {
            status.online = online;
            status.syncing = syncing;
            status.pending = pending;
            if report.is_some() {
                status.last_report = report;
            }
        });
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
