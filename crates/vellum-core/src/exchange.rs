//! The per-request exchange.
//!
//! An [`Exchange`] is created for every inbound request and carries the
//! request identity, the in-flight request document, the response being
//! built, the error state and the concurrency token. It is exclusively owned
//! by one pipeline invocation: handlers and plugins receive `&mut Exchange`
//! and cannot retain it past the call.
//!
//! # Lifecycle
//!
//! ```text
//! Received → Routed → Authenticated → InterceptedBefore → Handled → InterceptedAfter → Committed
//!     └──────────┴───────────┴──────────────┴────────────┴──────────┴──→ Errored ──→ Committed
//! ```

use crate::context::RequestId;
use crate::error::VellumError;
use crate::identity::Identity;
use crate::resource::{ETag, ResourceRef};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    /// Created from an inbound request.
    Received,
    /// The target resource has been resolved.
    Routed,
    /// The caller identity has been established.
    Authenticated,
    /// Pre-handler plugins have run.
    InterceptedBefore,
    /// The resource handler has run.
    Handled,
    /// Post-handler plugins have run.
    InterceptedAfter,
    /// The exchange failed; only response commit remains.
    Errored,
    /// The response has been committed. Terminal.
    Committed,
}

impl ExchangeState {
    /// Returns the state name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Routed => "routed",
            Self::Authenticated => "authenticated",
            Self::InterceptedBefore => "intercepted_before",
            Self::Handled => "handled",
            Self::InterceptedAfter => "intercepted_after",
            Self::Errored => "errored",
            Self::Committed => "committed",
        }
    }

    /// The next state on the success path, if any.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Routed),
            Self::Routed => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::InterceptedBefore),
            Self::InterceptedBefore => Some(Self::Handled),
            Self::Handled => Some(Self::InterceptedAfter),
            Self::InterceptedAfter | Self::Errored => Some(Self::Committed),
            Self::Committed => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Errored` is reachable from any non-terminal state and `Committed`
    /// from any state but itself.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Committed, _) => false,
            (_, Self::Committed) => true,
            (Self::Errored, _) => false,
            (_, Self::Errored) => true,
            (current, next) => current.successor() == Some(next),
        }
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error state recorded on an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    /// Response status.
    pub status: StatusCode,
    /// Machine-readable error code.
    pub code: String,
    /// Message sent to the client.
    pub message: String,
}

/// Per-request state traversing the pipeline.
pub struct Exchange {
    request_id: RequestId,
    method: Method,
    path: String,
    query: HashMap<String, String>,
    request_headers: HeaderMap,
    content: Option<Value>,
    if_match: Option<ETag>,
    resource: Option<ResourceRef>,
    identity: Identity,

    status: StatusCode,
    response_headers: HeaderMap,
    response_content: Option<Value>,
    etag: Option<ETag>,
    error: Option<ExchangeError>,

    state: ExchangeState,
    stopped: bool,
    cancellation: CancellationToken,
    started_at: Instant,

    /// Type-erased extension data for stages and plugins.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Exchange {
    /// Creates an exchange for `method` on `target` (path plus optional
    /// query string) with no headers and no content.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        let (query, query_error) = match query {
            Ok(query) => (query, None),
            Err(message) => (HashMap::new(), Some(message)),
        };
        let mut exchange = Self {
            request_id: RequestId::new(),
            method,
            path,
            query,
            request_headers: HeaderMap::new(),
            content: None,
            if_match: None,
            resource: None,
            identity: Identity::Anonymous,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_content: None,
            etag: None,
            error: None,
            state: ExchangeState::Received,
            stopped: false,
            cancellation: CancellationToken::new(),
            started_at: Instant::now(),
            extensions: HashMap::new(),
        };
        if let Some(message) = query_error {
            tracing::warn!(request_id = %exchange.request_id, error = %message, "rejecting query string");
            exchange.fail(&VellumError::invalid_payload(message));
        }
        exchange
    }

    /// Creates an exchange from an inbound HTTP request.
    ///
    /// A non-empty body must be JSON; otherwise the exchange starts in error
    /// with `InvalidPayload`. The `If-Match` header becomes the exchange's
    /// concurrency token.
    #[must_use]
    pub fn from_request(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

        let mut exchange = Self::new(parts.method, &target);
        exchange.if_match = parts
            .headers
            .get(http::header::IF_MATCH)
            .and_then(|v| v.to_str().ok())
            .and_then(ETag::from_header);
        exchange.request_headers = parts.headers;

        if !body.is_empty() {
            match serde_json::from_slice::<Value>(&body) {
                Ok(content) => exchange.content = Some(content),
                Err(e) => exchange.fail(&VellumError::invalid_payload(format!(
                    "request body is not valid JSON: {e}"
                ))),
            }
        }

        exchange
    }

    /// Sets the request content.
    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    /// Sets a request header.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        if name == http::header::IF_MATCH {
            self.if_match = value.to_str().ok().and_then(ETag::from_header);
        }
        self.request_headers.insert(name, value);
        self
    }

    /// Sets the concurrency token presented by the client.
    #[must_use]
    pub fn with_if_match(mut self, etag: ETag) -> Self {
        self.if_match = Some(etag);
        self
    }

    /// Uses an existing cancellation token (e.g. the connection's).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Returns the request headers.
    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Returns the in-flight request document.
    #[must_use]
    pub fn content(&self) -> Option<&Value> {
        self.content.as_ref()
    }

    /// Returns the request document for mutation.
    pub fn content_mut(&mut self) -> Option<&mut Value> {
        self.content.as_mut()
    }

    /// Replaces the request document.
    pub fn set_content(&mut self, content: Option<Value>) {
        self.content = content;
    }

    /// Returns the concurrency token presented by the client.
    #[must_use]
    pub fn if_match(&self) -> Option<&ETag> {
        self.if_match.as_ref()
    }

    /// Returns the resolved target resource.
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceRef> {
        self.resource.as_ref()
    }

    /// Sets the resolved target resource.
    ///
    /// This should only be called by the routing stage.
    pub fn set_resource(&mut self, resource: ResourceRef) {
        self.resource = Some(resource);
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sets the caller identity.
    ///
    /// This should only be called by the authentication stage.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the response headers.
    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Returns the response headers for mutation.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Returns the response document.
    #[must_use]
    pub fn response_content(&self) -> Option<&Value> {
        self.response_content.as_ref()
    }

    /// Returns the response document for mutation.
    pub fn response_content_mut(&mut self) -> Option<&mut Value> {
        self.response_content.as_mut()
    }

    /// Replaces the response document.
    pub fn set_response_content(&mut self, content: Option<Value>) {
        self.response_content = content;
    }

    /// Returns the concurrency token of the affected document.
    #[must_use]
    pub fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    /// Sets the concurrency token of the affected document.
    pub fn set_etag(&mut self, etag: Option<ETag>) {
        self.etag = etag;
    }

    /// Whether the exchange is in error.
    #[must_use]
    pub fn is_in_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the recorded error.
    #[must_use]
    pub fn error(&self) -> Option<&ExchangeError> {
        self.error.as_ref()
    }

    /// Puts the exchange in error with an explicit status and message.
    pub fn set_in_error(&mut self, status: StatusCode, code: &str, message: impl Into<String>) {
        self.status = status;
        self.error = Some(ExchangeError {
            status,
            code: code.to_string(),
            message: message.into(),
        });
        self.advance(ExchangeState::Errored);
    }

    /// Puts the exchange in error from a taxonomy error.
    ///
    /// Only the client-facing message is recorded.
    pub fn fail(&mut self, error: &VellumError) {
        self.set_in_error(error.status_code(), error.error_code(), error.client_message());
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Moves to `next` if the transition is legal; returns whether it moved.
    pub fn advance(&mut self, next: ExchangeState) -> bool {
        if self.state.can_advance_to(next) {
            tracing::trace!(
                request_id = %self.request_id,
                from = %self.state,
                to = %next,
                "exchange state transition"
            );
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Requests that the remainder of the chain be skipped.
    ///
    /// Response commit still runs.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether a stage or plugin declined to forward.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether the chain must not proceed (error, stop or cancellation).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_in_error() || self.stopped || self.is_cancelled()
    }

    /// Returns the cancellation token of this exchange.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the caller abandoned the exchange.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the elapsed time since the exchange was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use vellum_core::Exchange;
    ///
    /// #[derive(Clone)]
    /// struct Tenant(String);
    ///
    /// let mut exchange = Exchange::new(http::Method::GET, "/users");
    /// exchange.set_extension(Tenant("acme".into()));
    ///
    /// assert_eq!(exchange.get_extension::<Tenant>().unwrap().0, "acme");
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

// Decoding is lossy: undecodable percent sequences come back as U+FFFD.
fn split_target(target: &str) -> (String, Result<HashMap<String, String>, String>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let query = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map_err(|e| format!("query string is not valid: {e}"))
        .and_then(|pairs| {
            let replaced = |s: &str| s.contains(char::REPLACEMENT_CHARACTER);
            if !replaced(query) && pairs.iter().any(|(k, v)| replaced(k) || replaced(v)) {
                Err("query string is not valid percent-encoded UTF-8".to_string())
            } else {
                Ok(pairs.into_iter().collect())
            }
        });
    (path.to_string(), query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_exchange_defaults() {
        let exchange = Exchange::new(Method::GET, "/users/bob?id_type=string");
        assert_eq!(exchange.path(), "/users/bob");
        assert_eq!(exchange.query_param("id_type"), Some("string"));
        assert_eq!(exchange.state(), ExchangeState::Received);
        assert_eq!(exchange.status(), StatusCode::OK);
        assert!(matches!(exchange.identity(), Identity::Anonymous));
        assert!(!exchange.is_terminal());
    }

    #[test]
    fn test_undecodable_query_is_rejected() {
        let exchange = Exchange::new(Method::PUT, "/c/a?filter=%FF&checkEtag");
        assert!(exchange.is_in_error());
        assert_eq!(exchange.error().unwrap().status, StatusCode::NOT_ACCEPTABLE);
        assert!(exchange.query_param("checkEtag").is_none());
        assert_eq!(exchange.path(), "/c/a");
    }

    #[test]
    fn test_query_is_percent_decoded() {
        let exchange = Exchange::new(Method::GET, "/c?filter=%7B%27a%27%3A1%7D&checkEtag");
        assert_eq!(exchange.query_param("filter"), Some("{'a':1}"));
        assert_eq!(exchange.query_param("checkEtag"), Some(""));
    }

    #[test]
    fn test_from_request_parses_body_and_if_match() {
        let request = http::Request::builder()
            .method(Method::PUT)
            .uri("/users/bob")
            .header(http::header::IF_MATCH, "\"v1\"")
            .body(Bytes::from(r#"{"name":"Bob"}"#))
            .unwrap();

        let exchange = Exchange::from_request(request);
        assert_eq!(exchange.content(), Some(&json!({"name": "Bob"})));
        assert_eq!(exchange.if_match().unwrap().as_str(), "v1");
        assert!(!exchange.is_in_error());
    }

    #[test]
    fn test_from_request_rejects_malformed_body() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/users")
            .body(Bytes::from("{not json"))
            .unwrap();

        let exchange = Exchange::from_request(request);
        assert!(exchange.is_in_error());
        assert_eq!(exchange.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(exchange.state(), ExchangeState::Errored);
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut exchange = Exchange::new(Method::GET, "/c");
        for next in [
            ExchangeState::Routed,
            ExchangeState::Authenticated,
            ExchangeState::InterceptedBefore,
            ExchangeState::Handled,
            ExchangeState::InterceptedAfter,
            ExchangeState::Committed,
        ] {
            assert!(exchange.advance(next), "transition to {next} rejected");
        }
        assert!(!exchange.advance(ExchangeState::Errored));
    }

    #[test]
    fn test_state_machine_rejects_skips() {
        let mut exchange = Exchange::new(Method::GET, "/c");
        assert!(!exchange.advance(ExchangeState::Handled));
        assert_eq!(exchange.state(), ExchangeState::Received);
    }

    #[test]
    fn test_errored_goes_straight_to_committed() {
        let mut exchange = Exchange::new(Method::GET, "/c");
        exchange.advance(ExchangeState::Routed);
        exchange.fail(&VellumError::not_found("no such collection"));

        assert_eq!(exchange.state(), ExchangeState::Errored);
        assert!(!exchange.advance(ExchangeState::Authenticated));
        assert!(exchange.advance(ExchangeState::Committed));
    }

    #[test]
    fn test_cancellation_makes_exchange_terminal() {
        let exchange = Exchange::new(Method::GET, "/c");
        exchange.cancellation().cancel();
        assert!(exchange.is_cancelled());
        assert!(exchange.is_terminal());
    }

    #[test]
    fn test_extensions() {
        let mut exchange = Exchange::new(Method::GET, "/c");
        exchange.set_extension(42_u32);
        assert_eq!(exchange.get_extension::<u32>(), Some(&42));
        assert_eq!(exchange.remove_extension::<u32>(), Some(42));
        assert!(exchange.get_extension::<u32>().is_none());
    }
}
