// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Binary content awaiting upload, and resolved placeholder mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Raw or transformed binary awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub id: i64,
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl StoredBlob {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Resolved correspondence between a placeholder and a server-assigned value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMapping {
    pub token: Token,
    pub resolved_value: String,
    pub resource_type: String,
    pub created_at: DateTime<Utc>,
}
