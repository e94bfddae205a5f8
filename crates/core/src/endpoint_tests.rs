// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "/visits", "/visits" },
    nested = { "/visits/v-1/notes", "/visits/v-1/notes" },
    trailing_slash = { "/visits/", "/visits" },
    no_leading_slash = { "visits/v-1", "/visits/v-1" },
    root = { "/", "/" },
    placeholder = { "/visits/temp_visit_1/notes", "/visits/temp_visit_1/notes" },
)]
fn parse_render_preserves_path(input: &str, expected: &str) {
    assert_eq!(Endpoint::parse(input).render(), expected);
}

#[test]
fn placeholder_segments_become_refs() {
    let endpoint = Endpoint::parse("/visits/temp_visit_1/notes");
    let tokens: Vec<_> = endpoint.unresolved().map(Token::as_str).collect();
    assert_eq!(tokens, vec!["temp_visit_1"]);
    assert!(matches!(endpoint.segments()[1], Segment::Ref(Ref::Temp(_))));
}

#[test]
fn resolve_rewrites_segment() {
    let token = Token::parse("temp_visit_1").unwrap();
    let mut endpoint = Endpoint::parse("/visits/temp_visit_1/notes");

    assert!(endpoint.resolve(&token, "v-100"));
    assert_eq!(endpoint.render(), "/visits/v-100/notes");
    assert_eq!(endpoint.unresolved().count(), 0);

    assert!(!endpoint.resolve(&token, "v-100"));
}

#[test]
fn resolve_ignores_partial_matches() {
    // A literal that merely contains the token text is not a ref.
    let token = Token::parse("temp_visit_1").unwrap();
    let mut endpoint = Endpoint::parse("/visits/xtemp_visit_1");
    assert!(!endpoint.resolve(&token, "v-100"));
    assert_eq!(endpoint.render(), "/visits/xtemp_visit_1");
}

#[test]
fn endpoint_serde_keeps_refs() {
    let endpoint = Endpoint::parse("/visits/temp_visit_1");
    let json = serde_json::to_string(&endpoint).unwrap();
    let back: Endpoint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, endpoint);
    assert_eq!(back.unresolved().count(), 1);
}
