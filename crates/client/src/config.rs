// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration management.
//!
//! Configuration is stored in `outbox.toml` and includes:
//! - `database`: path to the SQLite store (relative to the config file)
//! - retry budget, pacing, and polling intervals
//! - `[backend]`: base URL, credentials, and upload/health endpoints

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use outbox_core::op::DEFAULT_MAX_RETRIES;

use crate::error::{Error, Result};

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "outbox.toml";

/// Client configuration stored in `outbox.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database path (relative paths resolve against the config file).
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Attempts allowed per queued operation before it is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause after each successful item in a sync pass.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Pending-count refresh and health probe period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Field of a creation response holding the server-assigned identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Stable payload fields compared when matching a creation's queued copy.
    #[serde(default = "default_match_fields")]
    pub match_fields: Vec<String>,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Remote backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every API request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Endpoint that issues signed upload destinations.
    #[serde(default = "default_sign_endpoint")]
    pub sign_endpoint: String,
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> PathBuf {
    PathBuf::from("outbox.db")
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_item_delay_ms() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_match_fields() -> Vec<String> {
    vec!["parent_id".to_string(), "status".to_string()]
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_sign_endpoint() -> String {
    "/uploads/sign".to_string()
}

fn default_health_endpoint() -> String {
    "/health".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
            auth_token: None,
            sign_endpoint: default_sign_endpoint(),
            health_endpoint: default_health_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database(),
            max_retries: default_max_retries(),
            item_delay_ms: default_item_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            id_field: default_id_field(),
            match_fields: default_match_fields(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Saves configuration to the given file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "invalid base_url '{}': must start with http:// or https://",
                url
            )));
        }
        if self.id_field.is_empty() {
            return Err(Error::Config("id_field must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolves the database path against the directory holding the config file.
    pub fn database_path(&self, config_path: &Path) -> PathBuf {
        if self.database.is_absolute() {
            return self.database.clone();
        }
        match config_path.parent() {
            Some(dir) => dir.join(&self.database),
            None => self.database.clone(),
        }
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
