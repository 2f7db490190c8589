//! The optimistic-concurrency write path.
//!
//! [`DocumentWriter`] validates a [`WriteCommand`] (payload shape, reserved
//! and missing identifiers), then hands one conditional [`WriteRequest`] to
//! the store. The concurrency check itself happens inside the store, atomic
//! with the mutation.

use crate::{DocumentFilter, DocumentStore, Precondition, StoreError, WriteRequest};
use http::{Method, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use vellum_core::document::{canonical_id, id_to_path_segment, ID_KEY};
use vellum_core::{ETag, ResourceRef, VellumError, WriteMode};
use vellum_predicate::values_equal;

/// The parameters of one document mutation.
#[derive(Debug, Clone)]
pub struct WriteCommand {
    /// Target collection and its policies.
    pub resource: ResourceRef,
    /// Request method, for logging.
    pub method: Method,
    /// Replace or shallow merge.
    pub mode: WriteMode,
    /// Id addressed by the request path, if any.
    pub id_hint: Option<Value>,
    /// Filter constraints from the request.
    pub filter: DocumentFilter,
    /// Shard key constraints.
    pub shard_key: DocumentFilter,
    /// Submitted content; `None` is an empty document.
    pub content: Option<Value>,
    /// Client-supplied token.
    pub if_match: Option<ETag>,
    /// Whether an existing document may only be changed with a token.
    pub etag_check_required: bool,
}

impl WriteCommand {
    /// A replace command with no id hint, filters or token.
    pub fn new(resource: ResourceRef, method: Method, content: Option<Value>) -> Self {
        let etag_check_required = resource.etag_check_required;
        Self {
            resource,
            method,
            mode: WriteMode::Replace,
            id_hint: None,
            filter: DocumentFilter::new(),
            shard_key: DocumentFilter::new(),
            content,
            if_match: None,
            etag_check_required,
        }
    }

    /// Sets the write mode.
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the id addressed by the request path.
    pub fn with_id(mut self, id: Value) -> Self {
        self.id_hint = Some(id);
        self
    }

    /// Sets the client token.
    pub fn with_if_match(mut self, etag: Option<ETag>) -> Self {
        self.if_match = etag;
        self
    }

    /// Sets filter and shard key constraints.
    pub fn with_scope(mut self, filter: DocumentFilter, shard_key: DocumentFilter) -> Self {
        self.filter = filter;
        self.shard_key = shard_key;
        self
    }
}

/// Whether a successful write created or updated the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new identifier was inserted.
    Created,
    /// An existing document was replaced or merged.
    Updated,
}

impl WriteOutcome {
    /// Response status of this outcome.
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Created => StatusCode::CREATED,
            Self::Updated => StatusCode::OK,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// The result of a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    /// Created or updated.
    pub outcome: WriteOutcome,
    /// The assigned or validated id.
    pub id: Value,
    /// The document after the write.
    pub document: Value,
    /// The new token.
    pub etag: ETag,
    /// The replaced token, if the document existed.
    pub previous_etag: Option<ETag>,
}

/// Runs writes and deletes against a [`DocumentStore`].
#[derive(Clone)]
pub struct DocumentWriter {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for DocumentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWriter").finish_non_exhaustive()
    }
}

impl DocumentWriter {
    /// Creates a writer over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Writes one document.
    ///
    /// # Errors
    ///
    /// - `InvalidPayload` if the content is not a document, or its `_id`
    ///   disagrees with the id addressed by the path
    /// - `ReservedIdentifier` if the id is reserved for the collection's id type
    /// - `MissingIdentifier` if no id is given and the id type cannot be generated
    /// - `PreconditionFailed` if the concurrency check fails
    /// - `DuplicateKey` if the write collides with an existing id
    /// - `StoreUnavailable` on transient store failures
    pub async fn write(&self, command: WriteCommand) -> Result<WriteResult, VellumError> {
        let result = self.try_write(command).await;
        let outcome = match &result {
            Ok(r) => r.outcome.label(),
            Err(e) => e.error_code(),
        };
        metrics::counter!("vellum_writes_total", "outcome" => outcome).increment(1);
        result
    }

    async fn try_write(&self, command: WriteCommand) -> Result<WriteResult, VellumError> {
        let WriteCommand {
            resource,
            method,
            mode,
            id_hint,
            filter,
            shard_key,
            content,
            if_match,
            etag_check_required,
        } = command;
        let id_type = resource.id_type;

        let mut content = match content {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(VellumError::invalid_payload("data must be a json object")),
        };

        let body_id = content.get(ID_KEY).map(canonical_id);
        let id = match (id_hint.as_ref().map(canonical_id), body_id) {
            (Some(path_id), Some(body_id)) if !values_equal(&path_id, &body_id) => {
                return Err(VellumError::invalid_payload(
                    "_id in content body is different than the document id",
                ))
            }
            (Some(path_id), _) => Some(path_id),
            (None, body_id) => body_id,
        };

        if let Some(id) = &id {
            if id_type.is_reserved(id) {
                return Err(VellumError::reserved_identifier(id_to_path_segment(id)));
            }
        }

        let id = match id {
            Some(id) => id,
            None => id_type.generate().ok_or_else(|| {
                VellumError::missing_identifier(format!(
                    "_id in content body is mandatory for documents with id type {id_type}"
                ))
            })?,
        };
        content.insert(ID_KEY.to_string(), id.clone());

        let request = WriteRequest {
            id: id.clone(),
            content,
            mode,
            scope: filter.and(shard_key),
            precondition: Precondition::new(if_match, etag_check_required),
            new_etag: ETag::generate(),
        };
        let etag = request.new_etag.clone();

        let written = self
            .store
            .write(&resource.collection, request)
            .await
            .map_err(|e| log_store_error(&resource.collection, &method, e))?;

        let outcome = if written.created {
            WriteOutcome::Created
        } else {
            WriteOutcome::Updated
        };
        tracing::debug!(
            collection = %resource.collection,
            method = %method,
            id = %id,
            outcome = outcome.label(),
            "document written"
        );

        Ok(WriteResult {
            outcome,
            id,
            document: written.document,
            etag,
            previous_etag: written.previous_etag,
        })
    }

    /// Deletes one document under the same precondition rules as writes.
    pub async fn delete(
        &self,
        resource: &ResourceRef,
        id: &Value,
        if_match: Option<ETag>,
        etag_check_required: bool,
    ) -> Result<(), VellumError> {
        let id = &canonical_id(id);
        let result = self
            .store
            .delete(&resource.collection, id, Precondition::new(if_match, etag_check_required))
            .await;
        let outcome = match &result {
            Ok(_) => "deleted",
            Err(e) => e.outcome(),
        };
        metrics::counter!("vellum_writes_total", "outcome" => outcome).increment(1);

        result
            .map(|_| tracing::debug!(collection = %resource.collection, id = %id, "document deleted"))
            .map_err(|e| log_store_error(&resource.collection, &Method::DELETE, e))
    }
}

fn log_store_error(collection: &str, method: &Method, err: StoreError) -> VellumError {
    match &err {
        StoreError::Unavailable { .. } => {
            tracing::error!(collection, method = %method, error = %err, "store unavailable");
        }
        other => {
            tracing::debug!(collection, method = %method, outcome = other.outcome(), "write rejected");
        }
    }
    err.into()
}
