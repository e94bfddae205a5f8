// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "outbox", version, about = "Inspect and drain the offline mutation queue")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show queue, blob, and mapping counts
    Status {
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// List queued operations in drain order
    List {
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// Run one sync pass against the configured backend
    Sync {
        /// Skip the health check and assume the backend is reachable
        #[arg(long)]
        force: bool,
    },
    /// Probe the backend and sync on every reconnection until Ctrl-C
    Watch,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
