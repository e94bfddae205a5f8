// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! outbox - offline mutation queue and sync engine.
//!
//! Every mutating call is persisted before it is attempted, so nothing is
//! lost while the device is offline. A sync pass later drains the queue in a
//! safe order, rewriting client placeholders to server-assigned values as
//! creations and uploads complete.
//!
//! # Main Components
//!
//! - [`Outbox`] - facade wiring everything below together
//! - [`Enqueuer`] - persist-then-attempt for every mutation
//! - [`Remapper`] - placeholder to real identifier/path rewriting
//! - [`Pipeline`] - capture, transform, and signed upload of binaries
//! - [`SyncEngine`] - ordered, de-duplicating queue drain
//! - [`Monitor`] - connectivity listener and pending/syncing status
//! - [`Backend`] - seam to the remote service, with [`HttpBackend`]
//!
//! ```rust,ignore
//! use outbox::{Config, Mutation, Outbox};
//! use outbox_core::Token;
//!
//! let config = Config::load(path)?;
//! let outbox = Outbox::open(&config, path)?;
//! let token = Token::generate("visit");
//! let outcome = outbox
//!     .enqueue_and_attempt(Mutation::create("visit", "/visits", body, token))
//!     .await?;
//! if outcome.is_queued() {
//!     // carry on optimistically with outcome.body()["id"]
//! }
//! ```

mod cli;
mod commands;

pub mod backend;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod enqueue;
pub mod error;
pub mod http;
pub mod monitor;
pub mod pipeline;
pub mod remap;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod scenario_tests;

pub use backend::{ApiRequest, Backend, BackendError, BackendResult, SignedUpload, UploadRequest};
pub use cli::{Cli, Command, OutputFormat};
pub use client::Outbox;
pub use config::{BackendConfig, Config};
pub use connectivity::Connectivity;
pub use enqueue::{Enqueuer, Mutation, Outcome};
pub use error::{Error, Result};
pub use http::HttpBackend;
pub use monitor::{Monitor, Status};
pub use pipeline::{
    Attachment, Capture, Passthrough, Pipeline, Transcoded, Transcoder, TransformError,
    UploadOutcome,
};
pub use remap::Remapper;
pub use store::Store;
pub use sync::{SyncEngine, SyncReport};

use std::path::Path;

/// Execute a CLI command against the config at `config_path`.
pub fn run(config_path: &Path, command: Command) -> Result<()> {
    commands::run(config_path, command)
}
