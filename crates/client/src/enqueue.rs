// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation enqueuer: persist first, then attempt.
//!
//! Every mutation is written to the queue before any network call. The
//! immediate attempt then decides what happens to that durable copy:
//! - success removes it, found by the matching policy
//! - a connectivity failure keeps it and returns an optimistic body
//! - any other failure removes it and surfaces the error

use std::sync::Arc;

use outbox_core::{Endpoint, Method, NewOperation, OperationKind, Token};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::{ApiRequest, Backend};
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::pipeline::{Attachment, Pipeline};
use crate::remap::Remapper;
use crate::store::Store;

/// Payload field carrying a creation's own correlation token.
pub const TEMP_ID_FIELD: &str = "_tempId";

/// A mutating call as issued by the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: OperationKind,
    pub family: String,
    pub method: Method,
    pub endpoint: Endpoint,
    pub payload: Value,
    pub token: Option<Token>,
    pub attachment: Option<Attachment>,
}

impl Mutation {
    pub fn new(
        kind: OperationKind,
        family: impl Into<String>,
        method: Method,
        endpoint: impl Into<Endpoint>,
        payload: Value,
    ) -> Self {
        Mutation {
            kind,
            family: family.into(),
            method,
            endpoint: endpoint.into(),
            payload,
            token: None,
            attachment: None,
        }
    }

    /// A `POST` creating a resource identified by `token` until the server assigns an id.
    pub fn create(family: &str, endpoint: &str, payload: Value, token: Token) -> Self {
        Self::new(OperationKind::Create, family, Method::Post, endpoint, payload).with_token(token)
    }

    pub fn update(family: &str, endpoint: &str, payload: Value) -> Self {
        Self::new(OperationKind::Update, family, Method::Patch, endpoint, payload)
    }

    pub fn delete(family: &str, endpoint: &str) -> Self {
        Self::new(OperationKind::Delete, family, Method::Delete, endpoint, Value::Null)
    }

    /// Derived work on a resource, e.g. processing an uploaded path.
    pub fn process(family: &str, endpoint: &str, payload: Value) -> Self {
        Self::new(OperationKind::Process, family, Method::Post, endpoint, payload)
    }

    pub fn upload(family: &str, attachment: Attachment) -> Self {
        Self::new(OperationKind::FileUpload, family, Method::Put, "/", Value::Null)
            .with_attachment(attachment)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// What the caller gets back from [`Enqueuer::enqueue_and_attempt`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The backend accepted the request; this is its response.
    Sent(Value),
    /// The request is queued; this is an optimistic body with `queued: true`.
    Queued(Value),
}

impl Outcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Outcome::Queued(_))
    }

    pub fn body(&self) -> &Value {
        match self {
            Outcome::Sent(body) | Outcome::Queued(body) => body,
        }
    }
}

pub struct Enqueuer {
    store: Store,
    backend: Arc<dyn Backend>,
    pipeline: Arc<Pipeline>,
    remapper: Remapper,
    connectivity: Connectivity,
    max_retries: u32,
    id_field: String,
    match_fields: Vec<String>,
}

impl Enqueuer {
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        pipeline: Arc<Pipeline>,
        connectivity: Connectivity,
        config: &Config,
    ) -> Self {
        Enqueuer {
            remapper: Remapper::new(store.clone()),
            store,
            backend,
            pipeline,
            connectivity,
            max_retries: config.max_retries,
            id_field: config.id_field.clone(),
            match_fields: config.match_fields.clone(),
        }
    }

    /// Persists the mutation, then attempts it immediately.
    pub async fn enqueue_and_attempt(&self, mutation: Mutation) -> Result<Outcome> {
        if mutation.kind == OperationKind::FileUpload {
            let attachment = mutation.attachment.ok_or(Error::MissingAttachment)?;
            let capture = self
                .pipeline
                .capture_and_queue_upload(&mutation.family, attachment)
                .await?;
            return Ok(if capture.queued {
                Outcome::Queued(capture.to_json())
            } else {
                Outcome::Sent(capture.to_json())
            });
        }

        let mut draft = self.draft(mutation)?;
        self.remapper.resolve_known(&mut draft)?;
        let op_id = self.store.with(|db| db.insert_op(&draft))?;
        debug!(op_id, kind = %draft.kind, token = ?draft.token, "operation persisted");

        if !self.connectivity.is_online() {
            debug!(op_id, "offline, leaving queued");
            return Ok(Outcome::Queued(queued_body(&draft)));
        }
        if !draft.unresolved().is_empty() {
            debug!(op_id, "waiting on unresolved placeholder");
            return Ok(Outcome::Queued(queued_body(&draft)));
        }

        let request = ApiRequest::new(draft.method, &draft.endpoint, &draft.payload);
        match self.backend.send(request).await {
            Ok(response) => {
                self.remove_match(&draft)?;
                if let Some(token) = &draft.token {
                    if draft.kind == OperationKind::Create {
                        let id = extract_id(&response, &self.id_field)?;
                        self.remapper.resolve(token, &id, &draft.family)?;
                    }
                }
                Ok(Outcome::Sent(response))
            }
            Err(e) if e.is_connectivity() => {
                info!(op_id, error = %e, "connectivity failure, operation queued");
                Ok(Outcome::Queued(queued_body(&draft)))
            }
            Err(e) => {
                warn!(op_id, error = %e, "request rejected, dropping queued copy");
                self.remove_match(&draft)?;
                Err(Error::Rejected(e))
            }
        }
    }

    fn draft(&self, mutation: Mutation) -> Result<NewOperation> {
        let mut payload = mutation.payload;
        if mutation.kind == OperationKind::Create {
            let token = mutation.token.as_ref().ok_or(Error::MissingToken)?;
            if let Value::Object(map) = &mut payload {
                map.insert(TEMP_ID_FIELD.to_string(), Value::String(token.to_string()));
            }
        }

        let mut draft = NewOperation::new(
            mutation.kind,
            mutation.family,
            mutation.method,
            mutation.endpoint,
            payload,
        )
        .with_max_retries(self.max_retries);
        if let Some(token) = mutation.token {
            draft = draft.with_token(token);
        }
        Ok(draft)
    }

    /// Removes the newest queued entry matching `draft`.
    ///
    /// Creations match on token plus the configured stable fields; everything
    /// else matches on the normalised payload.
    fn remove_match(&self, draft: &NewOperation) -> Result<Option<i64>> {
        let removed = self.store.with(|db| {
            let found = match (&draft.token, draft.kind) {
                (Some(token), OperationKind::Create) => db
                    .find_creates_by_token(token)?
                    .into_iter()
                    .find(|op| {
                        self.match_fields
                            .iter()
                            .all(|f| op.payload.get(f) == draft.payload.get(f))
                    }),
                _ => {
                    let wanted = draft.payload.render();
                    db.find_ops_by_request(draft)?
                        .into_iter()
                        .find(|op| op.payload.render() == wanted)
                }
            };
            match found {
                Some(op) => {
                    db.delete_op(op.id)?;
                    Ok(Some(op.id))
                }
                None => Ok(None),
            }
        })?;
        if removed.is_none() {
            debug!(kind = %draft.kind, "no queued copy left to remove");
        }
        Ok(removed)
    }
}

/// The optimistic body returned while an operation waits in the queue.
fn queued_body(draft: &NewOperation) -> Value {
    let mut body = match draft.payload.render() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(token) = &draft.token {
        body.insert("id".to_string(), Value::String(token.to_string()));
    }
    body.insert("queued".to_string(), Value::Bool(true));
    Value::Object(body)
}

/// Reads the server-assigned identifier from a creation response.
pub(crate) fn extract_id(response: &Value, field: &str) -> Result<String> {
    match response.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::MissingIdentifier {
            field: field.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
