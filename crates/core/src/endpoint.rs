// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request paths whose segments may reference unborn resources.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::token::{Ref, Token};

/// One `/`-separated piece of an endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Lit(String),
    Ref(Ref),
}

/// A request path, e.g. `/visits/temp_visit_1/notes`.
///
/// Placeholder segments are parsed into [`Ref::Temp`] so remapping rewrites a
/// typed slot instead of searching the path text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    segments: Vec<Segment>,
}

impl Endpoint {
    /// Parses a path, classifying each segment.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match Ref::from_value(s) {
                r @ Ref::Temp(_) => Segment::Ref(r),
                Ref::Resolved(lit) => Segment::Lit(lit),
            })
            .collect();
        Endpoint { segments }
    }

    /// Renders the path with every ref's current value.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Lit(s) => out.push_str(s),
                Segment::Ref(r) => out.push_str(r.as_str()),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Returns the tokens still waiting for a real value.
    pub fn unresolved(&self) -> impl Iterator<Item = &Token> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Ref(r) => r.token(),
            Segment::Lit(_) => None,
        })
    }

    /// Rewrites every segment holding `token`. Returns true if anything changed.
    pub fn resolve(&mut self, token: &Token, value: &str) -> bool {
        let mut changed = false;
        for segment in &mut self.segments {
            if let Segment::Ref(r) = segment {
                changed |= r.resolve(token, value);
            }
        }
        changed
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Endpoint::parse(path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
