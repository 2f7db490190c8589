//! Routing stage.
//!
//! Resolves `/{collection}[/{id}]` against the [`ResourceCatalog`] and
//! attaches the resulting [`ResourceRef`] and [`RequestScope`] to the
//! exchange.
//!
//! Query parameters:
//!
//! | Parameter | Effect |
//! |---|---|
//! | `id_type` | Overrides the collection's id type for this request |
//! | `checkEtag` | Forces the concurrency check (`checkEtag`, `checkEtag=true`) |
//! | `filter` | JSON object of dot-path equality constraints |
//! | `shardkey` | JSON object of shard key constraints |

use crate::middleware::{BoxFuture, Middleware};
use std::collections::BTreeMap;
use vellum_config::VellumConfig;
use vellum_core::document::parse_literal;
use vellum_core::{DocIdType, Exchange, ResourceRef, VellumError};
use vellum_store::DocumentFilter;

/// Served collections and their policies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCatalog {
    resources: BTreeMap<String, ResourceRef>,
}

impl ResourceCatalog {
    /// Creates an empty catalog; every collection is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the catalog from the configured resources.
    pub fn from_config(config: &VellumConfig) -> Self {
        Self {
            resources: config
                .resources
                .keys()
                .filter_map(|name| config.resource(name).map(|r| (name.clone(), r)))
                .collect(),
        }
    }

    /// Adds one collection.
    pub fn with_collection(mut self, resource: ResourceRef) -> Self {
        self.resources.insert(resource.collection.clone(), resource);
        self
    }

    /// Looks up a collection.
    pub fn get(&self, collection: &str) -> Option<&ResourceRef> {
        self.resources.get(collection)
    }

    /// Number of served collections.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no collection is served.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Filter and shard key constraints of the routed request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestScope {
    /// `filter` query constraints.
    pub filter: DocumentFilter,
    /// `shardkey` query constraints.
    pub shard_key: DocumentFilter,
}

/// The routing stage.
#[derive(Debug, Clone, Default)]
pub struct RoutingStage {
    catalog: ResourceCatalog,
}

impl RoutingStage {
    /// Creates a routing stage over `catalog`.
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self { catalog }
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    fn route(&self, exchange: &mut Exchange) -> Result<(), VellumError> {
        let path = exchange.path().trim_matches('/');
        let mut segments = path.splitn(2, '/');
        let collection = segments.next().filter(|s| !s.is_empty());
        let id_segment = segments.next();

        let Some(collection) = collection else {
            return Err(VellumError::not_found("no collection in request path"));
        };
        if id_segment.is_some_and(|s| s.is_empty() || s.contains('/')) {
            return Err(VellumError::not_found(format!("no resource at {}", exchange.path())));
        }

        let mut resource = self
            .catalog
            .get(collection)
            .cloned()
            .ok_or_else(|| VellumError::not_found(format!("collection {collection} does not exist")))?;

        if let Some(id_type) = exchange.query_param("id_type") {
            resource.id_type = id_type.parse::<DocIdType>()?;
        }
        if let Some(check) = exchange.query_param("checkEtag") {
            resource.etag_check_required |= check.is_empty() || check.eq_ignore_ascii_case("true");
        }
        if let Some(segment) = id_segment {
            let id = resource.id_type.id_from_segment(segment)?;
            resource = resource.with_document(id);
        }

        let scope = RequestScope {
            filter: query_filter(exchange, "filter")?,
            shard_key: query_filter(exchange, "shardkey")?,
        };

        tracing::debug!(
            request_id = %exchange.request_id(),
            collection = %resource.collection,
            id_type = %resource.id_type,
            document = resource.is_document(),
            "request routed"
        );
        exchange.set_resource(resource);
        exchange.set_extension(scope);
        Ok(())
    }
}

fn query_filter(exchange: &Exchange, name: &str) -> Result<DocumentFilter, VellumError> {
    match exchange.query_param(name) {
        None => Ok(DocumentFilter::new()),
        Some(text) => Ok(DocumentFilter::from_value(&parse_literal(text)?)?),
    }
}

impl Middleware for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
        Box::pin(async move { self.route(exchange) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use serde_json::json;

    fn stage() -> RoutingStage {
        RoutingStage::new(
            ResourceCatalog::new()
                .with_collection(ResourceRef::collection("users", DocIdType::String))
                .with_collection(ResourceRef::collection("events", DocIdType::ObjectId).with_etag_check(true)),
        )
    }

    async fn route(target: &str) -> Result<Exchange, VellumError> {
        let mut exchange = Exchange::new(Method::GET, target);
        stage().process(&mut exchange).await?;
        Ok(exchange)
    }

    #[tokio::test]
    async fn test_collection_and_document() {
        let exchange = route("/users").await.unwrap();
        let resource = exchange.resource().unwrap();
        assert_eq!(resource.collection, "users");
        assert!(!resource.is_document());

        let exchange = route("/users/ann").await.unwrap();
        assert_eq!(exchange.resource().unwrap().document_id, Some(json!("ann")));
    }

    #[tokio::test]
    async fn test_object_id_segment() {
        let exchange = route("/events/0123456789abcdef01234567").await.unwrap();
        let resource = exchange.resource().unwrap();
        assert_eq!(resource.document_id, Some(json!({"$oid": "0123456789abcdef01234567"})));
        assert!(resource.etag_check_required);

        let err = route("/events/not-an-oid").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let err = route("/orders/1").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(route("/").await.unwrap_err().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(route("/users/a/b").await.unwrap_err().status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_query_overrides() {
        let exchange = route("/users/42?id_type=number&checkEtag").await.unwrap();
        let resource = exchange.resource().unwrap();
        assert_eq!(resource.id_type, DocIdType::Number);
        assert_eq!(resource.document_id, Some(json!(42)));
        assert!(resource.etag_check_required);

        let err = route("/users?id_type=uuid").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_and_shard_key() {
        let exchange = route("/users/ann?filter={'team':'blue'}&shardkey={region:'eu'}")
            .await
            .unwrap();
        let scope = exchange.get_extension::<RequestScope>().unwrap();
        assert!(scope.filter.matches(&json!({"team": "blue"})));
        assert!(!scope.filter.matches(&json!({"team": "red"})));
        assert!(scope.shard_key.matches(&json!({"region": "eu"})));

        let err = route("/users?filter=[1]").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_catalog_from_config() {
        let mut config = VellumConfig::default();
        config.resources.insert("users".into(), Default::default());
        config.defaults.etag_check = true;

        let catalog = ResourceCatalog::from_config(&config);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("users").unwrap().etag_check_required);
        assert!(catalog.get("orders").is_none());
    }
}
