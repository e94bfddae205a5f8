// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder tokens and typed references.
//!
//! A [`Token`] stands in for a value the server has not assigned yet: the id of
//! a resource whose creation is still queued, or the storage path of a blob
//! that has not been uploaded. Tokens share one format for both uses:
//!
//! Format: `temp_{family}_{unix_ms}_{random_hex}`
//!
//! Anything starting with [`PLACEHOLDER_PREFIX`] is treated as a placeholder,
//! which lets callers supply their own tokens (e.g. `temp_visit_1`).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Literal prefix shared by every placeholder.
pub const PLACEHOLDER_PREFIX: &str = "temp_";

/// A client-generated placeholder for a not-yet-known server value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Generates a fresh token for the given resource family.
    pub fn generate(family: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::random();
        Token(format!("{PLACEHOLDER_PREFIX}{family}_{millis}_{suffix:08x}"))
    }

    /// Parses a caller-supplied token.
    pub fn parse(s: &str) -> Result<Self> {
        if Self::is_placeholder(s) {
            Ok(Token(s.to_string()))
        } else {
            Err(Error::InvalidToken(s.to_string()))
        }
    }

    /// Returns true if the value still looks like a placeholder.
    pub fn is_placeholder(value: &str) -> bool {
        value.len() > PLACEHOLDER_PREFIX.len() && value.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Token::parse(s)
    }
}

impl TryFrom<String> for Token {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        if Token::is_placeholder(&s) {
            Ok(Token(s))
        } else {
            Err(Error::InvalidToken(s))
        }
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// A reference stored at a known position of an endpoint or payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Ref {
    /// Still waiting for the server-assigned value.
    Temp(Token),
    /// The real value is known.
    Resolved(String),
}

impl Ref {
    /// Classifies a raw string as a placeholder or a concrete value.
    pub fn from_value(value: &str) -> Self {
        match Token::parse(value) {
            Ok(token) => Ref::Temp(token),
            Err(_) => Ref::Resolved(value.to_string()),
        }
    }

    /// Returns the pending token, if unresolved.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Ref::Temp(token) => Some(token),
            Ref::Resolved(_) => None,
        }
    }

    /// Returns true once the real value is known.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Ref::Resolved(_))
    }

    /// Returns the string currently held: the token or the resolved value.
    pub fn as_str(&self) -> &str {
        match self {
            Ref::Temp(token) => token.as_str(),
            Ref::Resolved(value) => value,
        }
    }

    /// Replaces `token` with `value`. Returns true if this ref changed.
    pub fn resolve(&mut self, token: &Token, value: &str) -> bool {
        match self {
            Ref::Temp(current) if current == token => {
                *self = Ref::Resolved(value.to_string());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
