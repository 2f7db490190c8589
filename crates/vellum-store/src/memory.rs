//! In-memory document store.

use crate::{BoxFuture, DocumentStore, Precondition, StoreError, StoreWrite, StoredDocument, WriteRequest};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use vellum_core::document::{canonical_id, id_to_path_segment, shallow_merge};
use vellum_core::WriteMode;

type Collection = DashMap<String, StoredDocument>;

/// A process-local store.
///
/// Each write holds the shard lock of its id for the whole
/// check-then-mutate step, so conditional writes on the same id are
/// serialized and never interleave.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: DashMap<String, Arc<Collection>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    fn collection(&self, name: &str) -> Arc<Collection> {
        Arc::clone(
            self.collections
                .entry(name.to_string())
                .or_default()
                .value(),
        )
    }

    fn existing(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).map(|c| Arc::clone(c.value()))
    }

    fn apply(&self, collection: &str, request: WriteRequest) -> Result<StoreWrite, StoreError> {
        let documents = self.collection(collection);
        let key = key_of(&request.id);

        let outcome = match documents.entry(key) {
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get();
                if !request.scope.matches(&stored.document) {
                    // The scoped update matched nothing, so the write turns
                    // into an insert of an id that already exists.
                    return Err(StoreError::DuplicateKey(format!(
                        "E11000 duplicate key error collection: {collection} _id: {}",
                        id_to_path_segment(&request.id)
                    )));
                }
                request.precondition.check(Some(&stored.etag))?;

                let document = match (request.mode, &stored.document) {
                    (WriteMode::Merge, Value::Object(current)) => {
                        let mut merged = current.clone();
                        shallow_merge(&mut merged, &request.content);
                        Value::Object(merged)
                    }
                    _ => Value::Object(request.content),
                };
                let previous = occupied.insert(StoredDocument {
                    document: document.clone(),
                    etag: request.new_etag,
                });
                Ok(StoreWrite {
                    document,
                    previous_etag: Some(previous.etag),
                    created: false,
                })
            }
            Entry::Vacant(vacant) => {
                request.precondition.check(None)?;
                let document = Value::Object(request.content);
                vacant.insert(StoredDocument {
                    document: document.clone(),
                    etag: request.new_etag,
                });
                Ok(StoreWrite {
                    document,
                    previous_etag: None,
                    created: true,
                })
            }
        };
        outcome
    }

    fn remove(&self, collection: &str, id: &Value, precondition: &Precondition) -> Result<StoredDocument, StoreError> {
        let missing = || StoreError::NotFound(format!("{collection}/{}", id_to_path_segment(id)));
        let documents = self.existing(collection).ok_or_else(missing)?;

        let removed = match documents.entry(key_of(id)) {
            Entry::Occupied(occupied) => precondition
                .check(Some(&occupied.get().etag))
                .map(|()| occupied.remove()),
            Entry::Vacant(_) => Err(missing()),
        };
        removed
    }
}

// serde_json objects keep keys sorted, so the serialized canonical id is a
// stable key.
fn key_of(id: &Value) -> String {
    canonical_id(id).to_string()
}

impl DocumentStore for InMemoryStore {
    fn find<'a>(
        &'a self,
        collection: &'a str,
        id: &'a Value,
    ) -> BoxFuture<'a, Result<Option<StoredDocument>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .existing(collection)
                .and_then(|documents| documents.get(&key_of(id)).map(|d| d.value().clone())))
        })
    }

    fn write<'a>(
        &'a self,
        collection: &'a str,
        request: WriteRequest,
    ) -> BoxFuture<'a, Result<StoreWrite, StoreError>> {
        Box::pin(async move { self.apply(collection, request) })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a Value,
        precondition: Precondition,
    ) -> BoxFuture<'a, Result<StoredDocument, StoreError>> {
        Box::pin(async move { self.remove(collection, id, &precondition) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentFilter;
    use serde_json::{json, Map};
    use vellum_core::ETag;

    fn request(id: Value, content: Value, mode: WriteMode, precondition: Precondition) -> WriteRequest {
        let Value::Object(mut content) = content else {
            panic!("content must be an object");
        };
        content.insert("_id".into(), id.clone());
        WriteRequest {
            id,
            content,
            mode,
            scope: DocumentFilter::new(),
            precondition,
            new_etag: ETag::generate(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = InMemoryStore::new();
        let write = store
            .write("c", request(json!("a"), json!({"x": 1}), WriteMode::Replace, Precondition::default()))
            .await
            .unwrap();
        assert!(write.created);
        assert!(write.previous_etag.is_none());

        let found = store.find("c", &json!("a")).await.unwrap().unwrap();
        assert_eq!(found.document, json!({"_id": "a", "x": 1}));
        assert!(store.find("c", &json!("b")).await.unwrap().is_none());
        assert!(store.find("other", &json!("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_is_shallow() {
        let store = InMemoryStore::new();
        store
            .write(
                "c",
                request(json!(1), json!({"a": {"x": 1}, "keep": true}), WriteMode::Replace, Precondition::default()),
            )
            .await
            .unwrap();
        let write = store
            .write("c", request(json!(1), json!({"a": {"y": 2}}), WriteMode::Merge, Precondition::default()))
            .await
            .unwrap();

        assert!(!write.created);
        assert_eq!(write.document, json!({"_id": 1, "a": {"y": 2}, "keep": true}));
    }

    #[tokio::test]
    async fn test_failed_precondition_does_not_mutate() {
        let store = InMemoryStore::new();
        store
            .write("c", request(json!("a"), json!({"v": 1}), WriteMode::Replace, Precondition::default()))
            .await
            .unwrap();

        let result = store
            .write(
                "c",
                request(
                    json!("a"),
                    json!({"v": 2}),
                    WriteMode::Replace,
                    Precondition::new(Some(ETag::new("stale")), true),
                ),
            )
            .await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed { .. })));
        assert_eq!(store.find("c", &json!("a")).await.unwrap().unwrap().document["v"], 1);
    }

    #[tokio::test]
    async fn test_scope_mismatch_is_duplicate_key() {
        let store = InMemoryStore::new();
        store
            .write("c", request(json!("a"), json!({"region": "eu"}), WriteMode::Replace, Precondition::default()))
            .await
            .unwrap();

        let mut scoped = request(json!("a"), json!({"region": "us"}), WriteMode::Replace, Precondition::default());
        scoped.scope = DocumentFilter::from_value(&json!({"region": "us"})).unwrap();
        assert!(matches!(store.write("c", scoped).await, Err(StoreError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let write = store
            .write("c", request(json!("a"), json!({}), WriteMode::Replace, Precondition::default()))
            .await
            .unwrap();
        assert!(write.created);

        assert!(matches!(
            store.delete("c", &json!("a"), Precondition::new(None, true)).await,
            Err(StoreError::PreconditionFailed { token_supplied: false, .. })
        ));

        let etag = store.find("c", &json!("a")).await.unwrap().unwrap().etag;
        store
            .delete("c", &json!("a"), Precondition::new(Some(etag), true))
            .await
            .unwrap();
        assert_eq!(store.count("c"), 0);
        assert!(matches!(
            store.delete("c", &json!("a"), Precondition::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_object_ids_key_canonically() {
        let a = json!({"$oid": "0123456789abcdef01234567"});
        let mut map = Map::new();
        map.insert("$oid".into(), json!("0123456789abcdef01234567"));
        assert_eq!(key_of(&a), key_of(&Value::Object(map)));
    }

    #[tokio::test]
    async fn test_numeric_ids_are_keyed_canonically() {
        let store = InMemoryStore::new();
        store
            .write("c", request(json!(7), json!({}), WriteMode::Replace, Precondition::default()))
            .await
            .unwrap();

        assert!(store.find("c", &json!(7.0)).await.unwrap().is_some());
        let write = store
            .write("c", request(json!(7.0), json!({"x": 1}), WriteMode::Merge, Precondition::default()))
            .await
            .unwrap();
        assert!(!write.created);
        assert_eq!(store.count("c"), 1);
    }
}
