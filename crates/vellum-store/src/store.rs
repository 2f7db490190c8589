//! The store API consumed by the write path.

use crate::{DocumentFilter, StoreError};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use vellum_core::{ETag, WriteMode};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stored document and its current concurrency token.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// The document, including `_id`.
    pub document: Value,
    /// Current ETag.
    pub etag: ETag,
}

/// The concurrency condition of a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precondition {
    /// Token supplied by the client.
    pub if_match: Option<ETag>,
    /// Whether an existing document may only be changed with a token.
    pub required: bool,
}

impl Precondition {
    /// Creates a precondition.
    pub fn new(if_match: Option<ETag>, required: bool) -> Self {
        Self { if_match, required }
    }

    /// Checks the condition against the stored token, `None` if absent.
    ///
    /// A supplied token is always compared. A missing token only fails when
    /// the check is required and the document exists.
    pub fn check(&self, current: Option<&ETag>) -> Result<(), StoreError> {
        match (current, &self.if_match) {
            (Some(current), Some(token)) if current == token => Ok(()),
            (Some(_), Some(_)) => Err(StoreError::token_mismatch()),
            (Some(_), None) if self.required => Err(StoreError::token_missing()),
            (None, Some(_)) => Err(StoreError::token_for_absent_document()),
            (Some(_) | None, None) => Ok(()),
        }
    }
}

/// One conditional mutation of a single document.
///
/// The store must evaluate `scope` and `precondition` and apply the change
/// as one atomic step with respect to other writers of the same id.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Target document id.
    pub id: Value,
    /// Submitted content; `_id` is already set.
    pub content: Map<String, Value>,
    /// Replace or shallow merge.
    pub mode: WriteMode,
    /// Filter and shard key constraints an existing document must satisfy.
    pub scope: DocumentFilter,
    /// Concurrency condition.
    pub precondition: Precondition,
    /// Token assigned to the document on success.
    pub new_etag: ETag,
}

/// What a successful store write did.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreWrite {
    /// The document as stored after the write.
    pub document: Value,
    /// The token the document had before, if it existed.
    pub previous_etag: Option<ETag>,
    /// Whether the document was inserted.
    pub created: bool,
}

/// A document store addressed by collection and id.
///
/// Implementations classify failures into [`StoreError`]; transient ones are
/// [`StoreError::Unavailable`].
pub trait DocumentStore: Send + Sync + 'static {
    /// Finds a document by id.
    fn find<'a>(
        &'a self,
        collection: &'a str,
        id: &'a Value,
    ) -> BoxFuture<'a, Result<Option<StoredDocument>, StoreError>>;

    /// Inserts or updates a document, atomically checking `request.scope`
    /// and `request.precondition`.
    fn write<'a>(
        &'a self,
        collection: &'a str,
        request: WriteRequest,
    ) -> BoxFuture<'a, Result<StoreWrite, StoreError>>;

    /// Deletes a document, atomically checking `precondition`.
    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a Value,
        precondition: Precondition,
    ) -> BoxFuture<'a, Result<StoredDocument, StoreError>>;
}
