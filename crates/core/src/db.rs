// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable stores.
//!
//! The [`Database`] struct holds the three persisted tables: the pending
//! operation queue, the blob store, and the placeholder mapping table. It is
//! pure storage: every method is a single-record add/get/update/delete, and
//! callers re-read a record before mutating it.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::blob::{IdentifierMapping, StoredBlob};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::op::{FileInfo, NewOperation, QueuedOperation, UploadStage};
use crate::payload::Payload;
use crate::token::Token;

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// SQL schema for the durable stores.
pub const SCHEMA: &str = r#"
-- Pending operations against the remote backend
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    family TEXT NOT NULL,
    endpoint TEXT NOT NULL,      -- JSON-encoded Endpoint
    method TEXT NOT NULL,
    payload TEXT NOT NULL,       -- JSON-encoded Payload
    token TEXT,                  -- correlation token or path placeholder
    created_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL,
    blob_ref INTEGER,
    file_name TEXT,
    file_type TEXT,
    file_size INTEGER,
    upload_stage TEXT,           -- awaiting_transform|ready_to_upload|NULL
    last_error TEXT
);

-- Binary content awaiting upload
CREATE TABLE IF NOT EXISTS blobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bytes BLOB NOT NULL,
    file_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Placeholder -> server value, one row per token, never deleted
CREATE TABLE IF NOT EXISTS mappings (
    token TEXT PRIMARY KEY,
    resolved_value TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_token ON queue(token);
CREATE INDEX IF NOT EXISTS idx_queue_kind ON queue(kind);
"#;

const OP_COLUMNS: &str = "id, kind, family, endpoint, method, payload, token, created_at,
     retry_count, max_retries, blob_ref, file_name, file_type, file_size,
     upload_stage, last_error";

/// Formats a timestamp with fixed width so stored values sort lexically.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn corrupted(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(message)),
    )
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value
        .parse()
        .map_err(|_| corrupted(format!("invalid value '{value}' in column '{column}'")))
}

/// Parse a JSON column from the database.
fn parse_json<T: serde::de::DeserializeOwned>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    serde_json::from_str(value)
        .map_err(|e| corrupted(format!("invalid JSON in column '{column}': {e}")))
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupted(format!("invalid timestamp '{value}' in column '{column}'")))
}

fn row_to_op(row: &Row<'_>) -> std::result::Result<QueuedOperation, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let endpoint: String = row.get(3)?;
    let method: String = row.get(4)?;
    let payload: String = row.get(5)?;
    let token: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let blob_ref: Option<i64> = row.get(10)?;
    let stage: Option<String> = row.get(14)?;

    let file = match (blob_ref, stage) {
        (Some(blob_ref), Some(stage)) => {
            let file_size: Option<i64> = row.get(13)?;
            Some(FileInfo {
                blob_ref,
                file_name: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
                file_type: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
                file_size: file_size.unwrap_or(0).max(0) as u64,
                stage: parse_db::<UploadStage>(&stage, "upload_stage")?,
            })
        }
        _ => None,
    };

    Ok(QueuedOperation {
        id: row.get(0)?,
        kind: parse_db(&kind, "kind")?,
        family: row.get(2)?,
        endpoint: parse_json::<Endpoint>(&endpoint, "endpoint")?,
        method: parse_db(&method, "method")?,
        payload: parse_json::<Payload>(&payload, "payload")?,
        token: token.map(|t| parse_db::<Token>(&t, "token")).transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        retry_count: row.get(8)?,
        max_retries: row.get(9)?,
        file,
        last_error: row.get(15)?,
    })
}

fn row_to_blob(row: &Row<'_>) -> std::result::Result<StoredBlob, rusqlite::Error> {
    let created_at: String = row.get(4)?;
    Ok(StoredBlob {
        id: row.get(0)?,
        bytes: row.get(1)?,
        file_name: row.get(2)?,
        mime_type: row.get(3)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_mapping(row: &Row<'_>) -> std::result::Result<IdentifierMapping, rusqlite::Error> {
    let token: String = row.get(0)?;
    let created_at: String = row.get(3)?;
    Ok(IdentifierMapping {
        token: parse_db(&token, "token")?,
        resolved_value: row.get(1)?,
        resource_type: row.get(2)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

/// Apply the schema and record the version.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    Ok(())
}

/// SQLite connection holding the queue, blob, and mapping tables.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Returns the schema version stored in the database.
    pub fn schema_version(&self) -> Result<i32> {
        Ok(self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    // -- queue ---------------------------------------------------------------

    /// Persist a new operation, returning its row id.
    pub fn insert_op(&self, op: &NewOperation) -> Result<i64> {
        self.insert_op_at(op, &Utc::now())
    }

    /// Persist a new operation with an explicit creation time.
    pub fn insert_op_at(&self, op: &NewOperation, created_at: &DateTime<Utc>) -> Result<i64> {
        let file = op.file.as_ref();
        self.conn.execute(
            "INSERT INTO queue (kind, family, endpoint, method, payload, token, created_at,
             retry_count, max_retries, blob_ref, file_name, file_type, file_size, upload_stage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                op.kind.as_str(),
                op.family,
                serde_json::to_string(&op.endpoint)?,
                op.method.as_str(),
                serde_json::to_string(&op.payload)?,
                op.token.as_ref().map(Token::as_str),
                format_timestamp(created_at),
                op.max_retries,
                file.map(|f| f.blob_ref),
                file.map(|f| f.file_name.as_str()),
                file.map(|f| f.file_type.as_str()),
                file.map(|f| f.file_size as i64),
                file.map(|f| f.stage.as_str()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a queued operation by id.
    pub fn get_op(&self, id: i64) -> Result<Option<QueuedOperation>> {
        let sql = format!("SELECT {OP_COLUMNS} FROM queue WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], row_to_op).optional()?)
    }

    /// List every queued operation in insertion order.
    pub fn list_ops(&self) -> Result<Vec<QueuedOperation>> {
        let sql = format!("SELECT {OP_COLUMNS} FROM queue ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map([], row_to_op)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// List every queued operation in sync drain order.
    pub fn list_ops_in_drain_order(&self) -> Result<Vec<QueuedOperation>> {
        let mut ops = self.list_ops()?;
        ops.sort_by_key(QueuedOperation::drain_key);
        Ok(ops)
    }

    /// Row ids of every queued operation in sync drain order.
    pub fn pending_ids(&self) -> Result<Vec<i64>> {
        Ok(self
            .list_ops_in_drain_order()?
            .into_iter()
            .map(|op| op.id)
            .collect())
    }

    /// Creation operations carrying the given correlation token, newest first.
    pub fn find_creates_by_token(&self, token: &Token) -> Result<Vec<QueuedOperation>> {
        let sql = format!(
            "SELECT {OP_COLUMNS} FROM queue WHERE token = ?1 AND kind = 'create' ORDER BY id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map(params![token.as_str()], row_to_op)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// Operations with the same kind, method, and endpoint, newest first.
    pub fn find_ops_by_request(&self, op: &NewOperation) -> Result<Vec<QueuedOperation>> {
        let sql = format!(
            "SELECT {OP_COLUMNS} FROM queue
             WHERE kind = ?1 AND method = ?2 AND endpoint = ?3 ORDER BY id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map(
                params![
                    op.kind.as_str(),
                    op.method.as_str(),
                    serde_json::to_string(&op.endpoint)?
                ],
                row_to_op,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// Persist a rewritten endpoint and payload.
    pub fn update_op_refs(&self, op: &QueuedOperation) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE queue SET endpoint = ?1, payload = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&op.endpoint)?,
                serde_json::to_string(&op.payload)?,
                op.id
            ],
        )?;
        if rows == 0 {
            return Err(Error::OperationNotFound(op.id));
        }
        Ok(())
    }

    /// Record a new upload stage and file metadata after an in-place transform.
    pub fn update_op_file(&self, id: i64, file: &FileInfo) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE queue SET upload_stage = ?1, file_name = ?2, file_type = ?3, file_size = ?4
             WHERE id = ?5",
            params![
                file.stage.as_str(),
                file.file_name,
                file.file_type,
                file.file_size as i64,
                id
            ],
        )?;
        if rows == 0 {
            return Err(Error::OperationNotFound(id));
        }
        Ok(())
    }

    /// Increment the retry counter and store the error. Returns the new count.
    pub fn record_failure(&self, id: i64, error: &str) -> Result<u32> {
        let count = self
            .conn
            .query_row(
                "UPDATE queue SET retry_count = retry_count + 1, last_error = ?1
                 WHERE id = ?2 RETURNING retry_count",
                params![error, id],
                |row| row.get(0),
            )
            .optional()?;
        count.ok_or(Error::OperationNotFound(id))
    }

    /// Delete a queued operation. Returns true if a row was removed.
    pub fn delete_op(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM queue WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Number of queued operations.
    pub fn count_ops(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // -- blobs ---------------------------------------------------------------

    /// Persist binary content, returning its row id.
    pub fn insert_blob(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO blobs (bytes, file_name, mime_type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![bytes, file_name, mime_type, format_timestamp(&Utc::now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_blob(&self, id: i64) -> Result<Option<StoredBlob>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, bytes, file_name, mime_type, created_at FROM blobs WHERE id = ?1",
                params![id],
                row_to_blob,
            )
            .optional()?)
    }

    /// Overwrite a blob in place, e.g. with transformed bytes.
    pub fn replace_blob(&self, id: i64, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE blobs SET bytes = ?1, file_name = ?2, mime_type = ?3 WHERE id = ?4",
            params![bytes, file_name, mime_type, id],
        )?;
        if rows == 0 {
            return Err(Error::BlobNotFound(id));
        }
        Ok(())
    }

    pub fn delete_blob(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM blobs WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn count_blobs(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // -- mappings ------------------------------------------------------------

    /// Record a mapping. Returns false if the token was already mapped; the
    /// first mapping always wins.
    pub fn insert_mapping(&self, token: &Token, resolved_value: &str, resource_type: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO mappings (token, resolved_value, resource_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.as_str(),
                resolved_value,
                resource_type,
                format_timestamp(&Utc::now())
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn get_mapping(&self, token: &Token) -> Result<Option<IdentifierMapping>> {
        Ok(self
            .conn
            .query_row(
                "SELECT token, resolved_value, resource_type, created_at
                 FROM mappings WHERE token = ?1",
                params![token.as_str()],
                row_to_mapping,
            )
            .optional()?)
    }

    pub fn count_mappings(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM mappings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
