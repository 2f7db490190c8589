//! Fixed-order pipeline scheduler.
//!
//! ## Stages
//!
//! | # | Stage | Runs | State on success |
//! |---|---|---|---|
//! | 1 | Routing | core | `Routed` |
//! | 2 | BeforeAuth | plugins | |
//! | 3 | Authentication | core | `Authenticated` |
//! | 4 | AfterAuth | plugins | |
//! | 5 | BeforeHandler | plugins | `InterceptedBefore` |
//! | 6 | ResourceHandler | core | `Handled` |
//! | 7 | AfterHandler | plugins | `InterceptedAfter` |
//! | 8 | ResponseCommit | plugins, then commit | `Committed` |
//!
//! Stages 1-7 only run while the exchange is not terminal: an error, a stop
//! request or a cancellation skips straight to response commit, which
//! always runs.
//!
//! The registry snapshot is taken once at entry, so a concurrent reload never
//! changes the plugins seen by an exchange in flight.

use crate::middleware::{BoxedMiddleware, Middleware};
use crate::stages::{AuthenticationStage, RoutingStage};
use crate::types::{build_response, Response};
use std::sync::Arc;
use tracing::Instrument;
use vellum_core::{Exchange, ExchangeState, VellumError};
use vellum_plugins::{Flow, InterceptPoint, PluginHandler, PluginRegistry, RegistrySnapshot};

/// Pipeline stage marker, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Resolve the target resource.
    Routing = 1,
    /// Plugins before authentication.
    BeforeAuth = 2,
    /// Establish the caller identity.
    Authentication = 3,
    /// Plugins after authentication.
    AfterAuth = 4,
    /// Plugins right before the handler.
    BeforeHandler = 5,
    /// Serve the resource.
    ResourceHandler = 6,
    /// Plugins after the handler.
    AfterHandler = 7,
    /// Plugins before commit, then commit.
    ResponseCommit = 8,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::BeforeAuth => "before_auth",
            Self::Authentication => "authentication",
            Self::AfterAuth => "after_auth",
            Self::BeforeHandler => "before_handler",
            Self::ResourceHandler => "resource_handler",
            Self::AfterHandler => "after_handler",
            Self::ResponseCommit => "response_commit",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 8] {
        [
            Self::Routing,
            Self::BeforeAuth,
            Self::Authentication,
            Self::AfterAuth,
            Self::BeforeHandler,
            Self::ResourceHandler,
            Self::AfterHandler,
            Self::ResponseCommit,
        ]
    }

    /// The interception point whose plugins this stage runs.
    #[must_use]
    pub const fn intercept_point(self) -> Option<InterceptPoint> {
        match self {
            Self::BeforeAuth => Some(InterceptPoint::BeforeAuth),
            Self::AfterAuth => Some(InterceptPoint::AfterAuth),
            Self::BeforeHandler => Some(InterceptPoint::BeforeHandler),
            Self::AfterHandler => Some(InterceptPoint::AfterHandler),
            Self::ResponseCommit => Some(InterceptPoint::BeforeResponseCommit),
            Self::Routing | Self::Authentication | Self::ResourceHandler => None,
        }
    }

    /// The exchange state reached when this stage completes normally.
    #[must_use]
    pub const fn completes(self) -> Option<ExchangeState> {
        match self {
            Self::Routing => Some(ExchangeState::Routed),
            Self::Authentication => Some(ExchangeState::Authenticated),
            Self::BeforeHandler => Some(ExchangeState::InterceptedBefore),
            Self::ResourceHandler => Some(ExchangeState::Handled),
            Self::AfterHandler => Some(ExchangeState::InterceptedAfter),
            Self::ResponseCommit => Some(ExchangeState::Committed),
            Self::BeforeAuth | Self::AfterAuth => None,
        }
    }
}

/// The registry snapshot an exchange runs against.
///
/// Set as an exchange extension at pipeline entry.
#[derive(Debug, Clone)]
pub struct PinnedSnapshot(pub Arc<RegistrySnapshot>);

/// The pipeline scheduler.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vellum_core::{DocIdType, Exchange, ResourceRef};
/// use vellum_middleware::{Pipeline, ResourceCatalog, ResourceHandler, RoutingStage};
/// use vellum_store::InMemoryStore;
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder(ResourceHandler::new(Arc::new(InMemoryStore::new())))
///     .routing(RoutingStage::new(
///         ResourceCatalog::new().with_collection(ResourceRef::collection("notes", DocIdType::String)),
///     ))
///     .build();
///
/// let exchange = Exchange::new(http::Method::PUT, "/notes/n1")
///     .with_content(serde_json::json!({"text": "hello"}));
/// let response = pipeline.run(exchange).await.unwrap();
/// assert_eq!(response.status(), http::StatusCode::CREATED);
/// # });
/// ```
pub struct Pipeline {
    registry: Arc<PluginRegistry>,
    routing: BoxedMiddleware,
    authentication: BoxedMiddleware,
    resource_handler: BoxedMiddleware,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline builder around the resource handler.
    #[must_use]
    pub fn builder(resource_handler: impl Middleware) -> PipelineBuilder {
        PipelineBuilder::new(resource_handler)
    }

    /// Returns the plugin registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Names of the stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        Stage::all()
            .into_iter()
            .map(|stage| match stage {
                Stage::Routing => self.routing.name(),
                Stage::Authentication => self.authentication.name(),
                Stage::ResourceHandler => self.resource_handler.name(),
                other => other.name(),
            })
            .collect()
    }

    /// Runs one exchange to completion.
    ///
    /// Returns `None` when the exchange was cancelled: there is nobody left
    /// to write the response to.
    pub async fn run(&self, exchange: Exchange) -> Option<Response> {
        let span = tracing::info_span!(
            "exchange",
            request_id = %exchange.request_id(),
            method = %exchange.method(),
            path = %exchange.path()
        );
        self.run_inner(exchange).instrument(span).await
    }

    async fn run_inner(&self, mut exchange: Exchange) -> Option<Response> {
        let snapshot = self.registry.snapshot();
        exchange.set_extension(PinnedSnapshot(Arc::clone(&snapshot)));

        for stage in Stage::all() {
            if stage == Stage::ResponseCommit {
                break;
            }
            if exchange.is_terminal() {
                tracing::debug!(
                    stage = stage.name(),
                    state = %exchange.state(),
                    cancelled = exchange.is_cancelled(),
                    "skipping remaining stages"
                );
                break;
            }

            match stage {
                Stage::Routing => run_core(self.routing.as_ref(), &mut exchange).await,
                Stage::Authentication => run_core(self.authentication.as_ref(), &mut exchange).await,
                Stage::ResourceHandler => run_core(self.resource_handler.as_ref(), &mut exchange).await,
                plugins => {
                    if let Some(point) = plugins.intercept_point() {
                        intercept(&snapshot, point, &mut exchange).await;
                    }
                }
            }

            if !exchange.is_terminal() {
                if let Some(state) = stage.completes() {
                    exchange.advance(state);
                }
            }
        }

        commit(&snapshot, exchange).await
    }
}

async fn run_core(stage: &dyn Middleware, exchange: &mut Exchange) {
    if let Err(err) = stage.process(exchange).await {
        record_failure(exchange, stage.name(), &err);
    }
}

fn record_failure(exchange: &mut Exchange, stage: &str, err: &VellumError) {
    if err.status_code().is_server_error() {
        tracing::error!(stage, error = %err, source = ?std::error::Error::source(err), "stage failed");
    } else {
        tracing::debug!(stage, code = err.error_code(), error = %err, "request rejected");
    }
    exchange.fail(err);
}

/// Runs the plugins registered at `point` that apply to the exchange.
///
/// Stops at the first plugin that errors or returns [`Flow::Stop`], and
/// before any plugin once the exchange is in error or cancelled.
async fn intercept(snapshot: &RegistrySnapshot, point: InterceptPoint, exchange: &mut Exchange) {
    for registration in snapshot.resolve(point, exchange) {
        if exchange.is_in_error() || exchange.is_cancelled() {
            break;
        }
        let PluginHandler::Interceptor(interceptor) = registration.handler() else {
            continue;
        };

        match interceptor.handle(exchange).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => {
                tracing::debug!(plugin = registration.name(), point = %point, "plugin stopped the exchange");
                exchange.stop();
                break;
            }
            Err(err) => {
                tracing::error!(
                    plugin = registration.name(),
                    point = %point,
                    error = %err,
                    "plugin failed"
                );
                exchange.fail(&VellumError::internal(format!("plugin {} failed", registration.name())));
                break;
            }
        }
    }
}

async fn commit(snapshot: &RegistrySnapshot, mut exchange: Exchange) -> Option<Response> {
    if !exchange.is_in_error() && !exchange.is_cancelled() {
        intercept(snapshot, InterceptPoint::BeforeResponseCommit, &mut exchange).await;
    }
    exchange.advance(ExchangeState::Committed);

    if exchange.is_cancelled() {
        tracing::debug!("exchange cancelled; response dropped");
        return None;
    }

    let response = build_response(&exchange);
    let status = response.status();
    metrics::counter!(
        "vellum_requests_total",
        "method" => exchange.method().to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    tracing::info!(
        status = status.as_u16(),
        duration_ms = exchange.elapsed().as_millis() as u64,
        identity = %exchange.identity().log_id(),
        "request completed"
    );
    Some(response)
}

/// Builder for a [`Pipeline`].
///
/// Routing defaults to an empty [`ResourceCatalog`](crate::ResourceCatalog)
/// (every collection is unknown), authentication to
/// [`AnonymousAuthenticator`](crate::AnonymousAuthenticator) and the
/// registry to an empty one.
pub struct PipelineBuilder {
    registry: Option<Arc<PluginRegistry>>,
    routing: Option<BoxedMiddleware>,
    authentication: Option<BoxedMiddleware>,
    resource_handler: BoxedMiddleware,
}

impl PipelineBuilder {
    /// Creates a builder around the resource handler.
    #[must_use]
    pub fn new(resource_handler: impl Middleware) -> Self {
        Self {
            registry: None,
            routing: None,
            authentication: None,
            resource_handler: Arc::new(resource_handler),
        }
    }

    /// Sets the plugin registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the routing stage.
    #[must_use]
    pub fn routing(mut self, routing: impl Middleware) -> Self {
        self.routing = Some(Arc::new(routing));
        self
    }

    /// Sets the authentication stage.
    #[must_use]
    pub fn authentication(mut self, authentication: impl Middleware) -> Self {
        self.authentication = Some(Arc::new(authentication));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            registry: self.registry.unwrap_or_default(),
            routing: self
                .routing
                .unwrap_or_else(|| Arc::new(RoutingStage::default())),
            authentication: self
                .authentication
                .unwrap_or_else(|| Arc::new(AuthenticationStage::default())),
            resource_handler: self.resource_handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        let stages = Stage::all();
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stages[0].name(), "routing");
        assert_eq!(stages[7].name(), "response_commit");
    }

    #[test]
    fn test_stage_points() {
        assert_eq!(Stage::Routing.intercept_point(), None);
        assert_eq!(Stage::ResourceHandler.intercept_point(), None);
        assert_eq!(
            Stage::ResponseCommit.intercept_point(),
            Some(InterceptPoint::BeforeResponseCommit)
        );
        let points: Vec<_> = Stage::all().iter().filter_map(|s| s.intercept_point()).collect();
        assert_eq!(points, InterceptPoint::ALL[..5].to_vec());
    }

    #[test]
    fn test_completed_states_follow_state_machine() {
        let mut state = ExchangeState::Received;
        for next in Stage::all().iter().filter_map(|s| s.completes()) {
            assert!(state.can_advance_to(next), "{state} -> {next}");
            state = next;
        }
        assert_eq!(state, ExchangeState::Committed);
    }
}
