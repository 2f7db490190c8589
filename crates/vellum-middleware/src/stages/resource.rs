//! Resource handler stage.
//!
//! | Method | Target | Effect |
//! |---|---|---|
//! | `GET` | document | Returns the stored document and its ETag |
//! | `POST` | collection | Creates, or replaces the document named by body `_id` |
//! | `PUT` | document | Replaces the document |
//! | `PATCH` | document | Shallow-merges into the document |
//! | `DELETE` | document | Deletes the document, `204` |
//!
//! Anything else is `405`.

use crate::middleware::{BoxFuture, Middleware};
use crate::stages::routing::RequestScope;
use http::header::{HeaderValue, LOCATION};
use http::{Method, StatusCode};
use std::sync::Arc;
use vellum_core::{Exchange, ResourceRef, VellumError, WriteMode};
use vellum_store::{DocumentStore, DocumentWriter, WriteCommand};

/// Serves documents of the routed collection from a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    writer: DocumentWriter,
}

impl ResourceHandler {
    /// Creates a handler over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            writer: DocumentWriter::new(store),
        }
    }

    async fn get(&self, exchange: &mut Exchange, resource: &ResourceRef) -> Result<(), VellumError> {
        let Some(id) = &resource.document_id else {
            return Err(VellumError::method_not_allowed(Method::GET.as_str()));
        };
        let stored = self
            .writer
            .store()
            .find(&resource.collection, id)
            .await
            .map_err(VellumError::from)?
            .ok_or_else(|| VellumError::not_found(format!("document {} does not exist", resource.document_path(id))))?;

        exchange.set_status(StatusCode::OK);
        exchange.set_etag(Some(stored.etag));
        exchange.set_response_content(Some(stored.document));
        Ok(())
    }

    async fn write(
        &self,
        exchange: &mut Exchange,
        resource: ResourceRef,
        mode: WriteMode,
    ) -> Result<(), VellumError> {
        let scope = exchange.get_extension::<RequestScope>().cloned().unwrap_or_default();
        let mut command = WriteCommand::new(resource.clone(), exchange.method().clone(), exchange.content().cloned())
            .with_mode(mode)
            .with_if_match(exchange.if_match().cloned())
            .with_scope(scope.filter, scope.shard_key);
        if let Some(id) = resource.document_id.clone() {
            command = command.with_id(id);
        }

        let result = self.writer.write(command).await?;

        exchange.set_status(result.outcome.status());
        exchange.set_etag(Some(result.etag));
        if result.outcome.status() == StatusCode::CREATED {
            let location = resource.document_path(&result.id);
            match HeaderValue::try_from(location.as_str()) {
                Ok(value) => {
                    exchange.response_headers_mut().insert(LOCATION, value);
                }
                Err(_) => {
                    tracing::warn!(location = %location, "location is not a valid header value");
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, exchange: &mut Exchange, resource: &ResourceRef) -> Result<(), VellumError> {
        let Some(id) = &resource.document_id else {
            return Err(VellumError::method_not_allowed(Method::DELETE.as_str()));
        };
        self.writer
            .delete(resource, id, exchange.if_match().cloned(), resource.etag_check_required)
            .await?;
        exchange.set_status(StatusCode::NO_CONTENT);
        Ok(())
    }

    async fn handle(&self, exchange: &mut Exchange) -> Result<(), VellumError> {
        let resource = exchange
            .resource()
            .cloned()
            .ok_or_else(|| VellumError::internal("exchange reached the resource handler unrouted"))?;

        let method = exchange.method().clone();
        match (method, resource.is_document()) {
            (Method::GET, _) => self.get(exchange, &resource).await,
            (Method::POST, false) => self.write(exchange, resource, WriteMode::Replace).await,
            (Method::PUT, true) => self.write(exchange, resource, WriteMode::Replace).await,
            (Method::PATCH, true) => self.write(exchange, resource, WriteMode::Merge).await,
            (Method::DELETE, _) => self.delete(exchange, &resource).await,
            (other, _) => Err(VellumError::method_not_allowed(other.as_str())),
        }
    }
}

impl Middleware for ResourceHandler {
    fn name(&self) -> &'static str {
        "resource_handler"
    }

    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
        Box::pin(self.handle(exchange))
    }
}
