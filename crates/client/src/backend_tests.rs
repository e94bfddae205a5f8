// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use outbox_core::Token;
use serde_json::json;

#[test]
fn api_request_renders_resolved_path_and_strips_volatile_fields() {
    let token = Token::parse("temp_visit_1").unwrap();
    let mut endpoint = Endpoint::parse("/visits/temp_visit_1/notes");
    let mut payload = Payload::new(json!({
        "visitId": "temp_visit_1",
        "text": "hello",
        "_queued": true,
    }));
    endpoint.resolve(&token, "v-100");
    payload.resolve(&token, "v-100");

    let request = ApiRequest::new(Method::Post, &endpoint, &payload);

    assert_eq!(request.path, "/visits/v-100/notes");
    assert_eq!(request.body, json!({"visitId": "v-100", "text": "hello"}));
}

#[test]
fn signed_upload_headers_default_to_empty() {
    let signed: SignedUpload =
        serde_json::from_value(json!({"url": "https://s3/x?sig=1", "path": "audio/x.mp3"})).unwrap();
    assert!(signed.headers.is_empty());
    assert_eq!(signed.path, "audio/x.mp3");
}

#[test]
fn only_connectivity_errors_are_transient() {
    assert!(BackendError::Connectivity("timeout".into()).is_connectivity());
    assert!(!BackendError::Decode("eof".into()).is_connectivity());
    assert!(!BackendError::Rejected {
        status: 503,
        message: String::new()
    }
    .is_connectivity());
}
