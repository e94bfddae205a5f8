// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations.

use std::path::Path;

use outbox_core::QueuedOperation;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, OutputFormat};
use crate::client::Outbox;
use crate::config::Config;
use crate::error::Result;
use crate::store::Store;

pub fn run(config_path: &Path, command: Command) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    match command {
        Command::Status { output } => status(&config, config_path, output),
        Command::List { output } => list(&config, config_path, output),
        Command::Sync { force } => sync(&config, config_path, force),
        Command::Watch => watch(&config, config_path),
    }
}

#[derive(Debug, Serialize)]
struct Counts {
    pending: usize,
    blobs: usize,
    mappings: usize,
}

fn status(config: &Config, config_path: &Path, output: OutputFormat) -> Result<()> {
    let store = Store::open(&config.database_path(config_path))?;
    let counts = store.with(|db| {
        Ok(Counts {
            pending: db.count_ops()?,
            blobs: db.count_blobs()?,
            mappings: db.count_mappings()?,
        })
    })?;

    match output {
        OutputFormat::Text => {
            println!("pending:  {}", counts.pending);
            println!("blobs:    {}", counts.blobs);
            println!("mappings: {}", counts.mappings);
        }
        OutputFormat::Json => println!("{}", json_string(&counts)?),
    }
    Ok(())
}

fn list(config: &Config, config_path: &Path, output: OutputFormat) -> Result<()> {
    let store = Store::open(&config.database_path(config_path))?;
    let ops = store.with(|db| db.list_ops_in_drain_order())?;

    match output {
        OutputFormat::Text => {
            if ops.is_empty() {
                println!("queue is empty");
            }
            for op in &ops {
                println!("{}", format_op_line(op));
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = ops.iter().map(op_json).collect();
            println!("{}", json_string(&rows)?);
        }
    }
    Ok(())
}

pub(crate) fn format_op_line(op: &QueuedOperation) -> String {
    let mut line = format!(
        "{:>5}  {:<11} {:<6} {}  retries {}/{}",
        op.id,
        op.kind.as_str(),
        op.method.as_str(),
        op.endpoint.render(),
        op.retry_count,
        op.max_retries
    );
    if let Some(file) = &op.file {
        line.push_str(&format!("  [{} {}B {}]", file.file_name, file.file_size, file.stage));
    }
    let waiting = op.unresolved();
    if !waiting.is_empty() {
        let names: Vec<&str> = waiting.iter().map(|t| t.as_str()).collect();
        line.push_str(&format!("  waiting on {}", names.join(", ")));
    }
    line
}

fn op_json(op: &QueuedOperation) -> serde_json::Value {
    json!({
        "id": op.id,
        "kind": op.kind,
        "family": op.family,
        "method": op.method,
        "path": op.endpoint.render(),
        "body": op.payload.render(),
        "token": op.token,
        "created_at": op.created_at,
        "retry_count": op.retry_count,
        "max_retries": op.max_retries,
        "file": op.file,
        "last_error": op.last_error,
        "unresolved": op.unresolved(),
    })
}

fn json_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| outbox_core::Error::Json(e).into())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn sync(config: &Config, config_path: &Path, force: bool) -> Result<()> {
    let outbox = Outbox::open(config, config_path)?;
    let monitor = outbox.probing_monitor();

    runtime()?.block_on(async {
        let online = if force {
            monitor.set_online(true);
            true
        } else {
            monitor.probe().await
        };
        if !online {
            println!("backend unreachable; {} operation(s) left queued", monitor.refresh_pending()?);
            return Ok(());
        }

        let report = monitor.sync().await?;
        println!(
            "synced {}, failed {}, skipped {}; {} pending",
            report.synced,
            report.failed,
            report.skipped,
            monitor.pending_count()
        );
        Ok(())
    })
}

fn watch(config: &Config, config_path: &Path) -> Result<()> {
    let outbox = Outbox::open(config, config_path)?;
    let monitor = outbox.probing_monitor();
    let cancel = CancellationToken::new();

    runtime()?.block_on(async {
        monitor.probe().await;
        let stop = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        };
        let (result, ()) = tokio::join!(monitor.run(cancel.clone()), stop);
        result
    })
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
