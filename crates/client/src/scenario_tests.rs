// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end behaviour of enqueue, remap, pipeline, and sync together.

#![allow(clippy::unwrap_used)]

use outbox_core::{Method, Token};
use serde_json::json;

use crate::enqueue::Mutation;
use crate::pipeline::Attachment;
use crate::test_helpers::Harness;

fn visit_token() -> Token {
    Token::parse("temp_visit_1").unwrap()
}

fn create_visit() -> Mutation {
    Mutation::create(
        "visit",
        "/visits",
        json!({"patient": "p-1", "status": "open"}),
        visit_token(),
    )
}

#[tokio::test]
async fn offline_create_is_queued_without_network() {
    let h = Harness::new(false);

    let outcome = h.outbox.enqueue_and_attempt(create_visit()).await.unwrap();

    assert_eq!(h.pending(), 1);
    assert_eq!(h.backend.network_calls(), 0);
    assert_eq!(outcome.body()["id"], json!("temp_visit_1"));
    assert_eq!(outcome.body()["queued"], json!(true));
}

#[tokio::test]
async fn reconnect_creates_once_and_rewrites_dependents() {
    let h = Harness::new(false);
    h.outbox.enqueue_and_attempt(create_visit()).await.unwrap();
    h.outbox
        .enqueue_and_attempt(Mutation::update(
            "visit",
            "/visits/temp_visit_1",
            json!({"status": "closed"}),
        ))
        .await
        .unwrap();
    h.outbox
        .enqueue_and_attempt(Mutation::process(
            "visit",
            "/transcriptions",
            json!({"visitId": "temp_visit_1"}),
        ))
        .await
        .unwrap();
    let before = h.pending();
    h.backend.push_response(Ok(json!({"id": "v-100"})));
    // Keep the dependents queued so the rewrite is observable.
    h.backend.push_response(Err(crate::backend::BackendError::Connectivity(
        "dropped".into(),
    )));

    h.set_online(true);
    h.outbox.sync().await.unwrap();

    assert_eq!(h.backend.sent_to(Method::Post, "/visits"), 1);
    let mapping = h
        .store()
        .with(|db| db.get_mapping(&visit_token()))
        .unwrap()
        .unwrap();
    assert_eq!(mapping.resolved_value, "v-100");
    assert_eq!(mapping.resource_type, "visit");

    let ops = h.store().with(|db| db.list_ops()).unwrap();
    assert!(h.pending() < before);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].endpoint.render(), "/visits/v-100");
    assert_eq!(ops[1].payload.render(), json!({"visitId": "v-100"}));
    assert!(ops.iter().all(|op| !op.has_unresolved()));
}

#[tokio::test]
async fn transform_runs_once_across_capture_and_sync() {
    let h = Harness::new(false);
    h.outbox
        .capture_and_queue_upload(
            "recording",
            Attachment::new(b"pcm".to_vec(), "take.wav", "audio/wav"),
        )
        .await
        .unwrap();

    h.set_online(true);
    let report = h.outbox.sync().await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(h.transcoder.calls(), 1);
    assert_eq!(h.backend.puts()[0].1, b"mp3:pcm");
    assert_eq!(h.blobs(), 0);
}

#[tokio::test]
async fn exhausted_item_is_dropped_without_network() {
    let h = Harness::new(false);
    h.outbox
        .enqueue_and_attempt(Mutation::update("visit", "/visits/v-1", json!({"n": 1})))
        .await
        .unwrap();
    let id = h.store().with(|db| db.pending_ids()).unwrap()[0];
    for _ in 0..3 {
        h.store().with(|db| db.record_failure(id, "HTTP 500")).unwrap();
    }

    h.set_online(true);
    let report = h.outbox.sync().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(h.pending(), 0);
    assert_eq!(h.backend.network_calls(), 0);
}

#[tokio::test]
async fn identical_offline_updates_are_not_collapsed() {
    let h = Harness::new(false);
    let update = Mutation::update("visit", "/visits/v-1", json!({"status": "closed"}));

    h.outbox.enqueue_and_attempt(update.clone()).await.unwrap();
    h.outbox.enqueue_and_attempt(update).await.unwrap();

    let ops = h.store().with(|db| db.list_ops()).unwrap();
    assert_eq!(ops.len(), 2);
    assert_ne!(ops[0].id, ops[1].id);
    assert_eq!(ops[0].payload, ops[1].payload);
}

#[tokio::test]
async fn enqueue_persists_before_the_network_outcome() {
    for online in [false, true] {
        let h = Harness::new(online);
        h.backend
            .push_response(Err(crate::backend::BackendError::Connectivity(
                "timeout".into(),
            )));

        h.outbox
            .enqueue_and_attempt(Mutation::update("visit", "/visits/v-1", json!({"n": 1, "_queued": true})))
            .await
            .unwrap();

        let ops = h.store().with(|db| db.list_ops()).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].payload.render(), json!({"n": 1}));
    }
}

#[tokio::test]
async fn one_creation_request_and_mapping_per_token() {
    let h = Harness::new(false);
    h.outbox.enqueue_and_attempt(create_visit()).await.unwrap();

    h.set_online(true);
    h.outbox.sync().await.unwrap();
    h.outbox.sync().await.unwrap();

    assert_eq!(h.backend.sent_to(Method::Post, "/visits"), 1);
    assert_eq!(h.store().with(|db| db.count_mappings()).unwrap(), 1);
    assert_eq!(h.pending(), 0);
}

#[tokio::test]
async fn gated_item_waits_for_upload_path() {
    let h = Harness::with_transcoder(false, crate::test_helpers::MockTranscoder::failing(usize::MAX));
    let capture = h
        .outbox
        .capture_and_queue_upload(
            "recording",
            Attachment::new(b"pcm".to_vec(), "take.wav", "audio/wav"),
        )
        .await
        .unwrap();
    h.outbox
        .enqueue_and_attempt(Mutation::process(
            "recording",
            "/transcriptions",
            json!({"path": capture.placeholder.as_str()}),
        ))
        .await
        .unwrap();

    h.set_online(true);
    let report = h.outbox.sync().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(h.backend.network_calls(), 0);
    assert_eq!(h.pending(), 2);
}

#[tokio::test]
async fn upload_path_reaches_dependent_within_one_pass() {
    let h = Harness::new(false);
    let capture = h
        .outbox
        .capture_and_queue_upload(
            "recording",
            Attachment::new(b"pcm".to_vec(), "take.wav", "audio/wav"),
        )
        .await
        .unwrap();
    h.outbox
        .enqueue_and_attempt(Mutation::process(
            "recording",
            "/transcriptions",
            json!({"path": capture.placeholder.as_str()}),
        ))
        .await
        .unwrap();

    h.set_online(true);
    let report = h.outbox.sync().await.unwrap();

    assert_eq!(report.synced, 2);
    assert_eq!(h.pending(), 0);
    assert_eq!(h.blobs(), 0);
    let puts = h.backend.puts();
    assert_eq!(puts.len(), 1);
    let sent = h.backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path, "/transcriptions");
    assert_eq!(sent[0].body, json!({"path": puts[0].0.path}));
    for request in &sent {
        assert!(!request.path.contains("temp_"));
        assert!(!request.body.to_string().contains("temp_"));
    }
}
