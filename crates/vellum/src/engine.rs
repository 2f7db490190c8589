//! The engine: configuration, store, plugin registry and pipeline wired
//! together, plus the startup lifecycle.

use crate::EngineError;
use bytes::Bytes;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vellum_config::{LogFormat, LoggingConfig, VellumConfig};
use vellum_core::{Exchange, VellumError};
use vellum_middleware::{
    AnonymousAuthenticator, AuthenticationStage, Authenticator, Pipeline, ResourceCatalog, ResourceHandler, Response,
    RoutingStage,
};
use vellum_plugins::{InterceptPoint, PluginCatalog, PluginRegistry};
use vellum_store::DocumentStore;
use vellum_telemetry::LogConfig;

const IDLE: u8 = 0;
const STARTING: u8 = 1;
const STARTED: u8 = 2;

/// Maps the `logging` section onto the logging setup.
#[must_use]
pub fn log_config(logging: &LoggingConfig) -> LogConfig {
    LogConfig {
        enabled: logging.enabled,
        level: logging.level.clone(),
        json_format: logging.format == LogFormat::Json,
        span_events: false,
        file_line_info: logging.include_location,
        include_target: true,
    }
}

/// A running request-processing core.
///
/// Build one with [`Engine::from_config`] or [`Engine::builder`], call
/// [`start`](Self::start) once, then feed requests to
/// [`handle`](Self::handle). Requests handled before `start` completes are
/// answered `503`.
pub struct Engine {
    catalog: PluginCatalog,
    pipeline: Pipeline,
    lifecycle: AtomicU8,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pipeline", &self.pipeline)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine with anonymous authentication.
    pub fn from_config(
        config: VellumConfig,
        catalog: PluginCatalog,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, EngineError> {
        Self::builder(config, catalog, store).build()
    }

    /// Creates an engine builder.
    pub fn builder(config: VellumConfig, catalog: PluginCatalog, store: Arc<dyn DocumentStore>) -> EngineBuilder {
        EngineBuilder {
            config,
            catalog,
            store,
            authentication: AuthenticationStage::new(AnonymousAuthenticator),
        }
    }

    /// Whether [`start`](Self::start) has completed its `BeforeStartup` phase.
    pub fn is_started(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == STARTED
    }

    /// The plugin registry serving requests.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        self.pipeline.registry()
    }

    /// The request pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Runs the startup lifecycle.
    ///
    /// `BeforeStartup` initializers run in priority order and the first
    /// failure aborts startup. The engine then accepts requests and
    /// `AfterStartup` initializers run; their failures are logged only.
    ///
    /// Only one call runs the lifecycle. Any call made while it is running or
    /// after it succeeded fails with [`EngineError::AlreadyStarted`]; a failed
    /// startup may be retried.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self
            .lifecycle
            .compare_exchange(IDLE, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::AlreadyStarted);
        }

        for (name, initializer) in self.registry().initializers(InterceptPoint::BeforeStartup) {
            if let Err(source) = initializer.init().await {
                tracing::error!(plugin = %name, point = %InterceptPoint::BeforeStartup, error = %source, "initializer failed");
                self.lifecycle.store(IDLE, Ordering::Release);
                return Err(EngineError::Startup { plugin: name, source });
            }
            tracing::debug!(plugin = %name, point = %InterceptPoint::BeforeStartup, "initializer done");
        }

        self.lifecycle.store(STARTED, Ordering::Release);
        tracing::info!(stages = ?self.pipeline.stage_names(), plugins = self.registry().snapshot().len(), "engine started");

        for (name, initializer) in self.registry().initializers(InterceptPoint::AfterStartup) {
            match initializer.init().await {
                Ok(()) => tracing::debug!(plugin = %name, point = %InterceptPoint::AfterStartup, "initializer done"),
                Err(e) => {
                    tracing::error!(plugin = %name, point = %InterceptPoint::AfterStartup, error = %e, "initializer failed");
                }
            }
        }
        Ok(())
    }

    /// Handles one request.
    ///
    /// Returns `None` only when the exchange was cancelled.
    pub async fn handle(&self, request: http::Request<Bytes>) -> Option<Response> {
        self.handle_cancellable(request, CancellationToken::new()).await
    }

    /// Handles one request that the caller may abandon through `cancellation`.
    pub async fn handle_cancellable(
        &self,
        request: http::Request<Bytes>,
        cancellation: CancellationToken,
    ) -> Option<Response> {
        let mut exchange = Exchange::from_request(request).with_cancellation(cancellation);
        if !self.is_started() && !exchange.is_in_error() {
            exchange.fail(&VellumError::not_ready("engine is not started"));
        }
        self.pipeline.run(exchange).await
    }

    /// Rebuilds plugin registrations from `config` and swaps them in atomically.
    ///
    /// In-flight exchanges finish with the registrations they started with.
    /// On error the current registrations stay in place. Served collections
    /// are fixed at build time and not affected.
    pub fn reload(&self, config: &VellumConfig) -> Result<(), EngineError> {
        config.validate()?;
        let registrations = self.catalog.registrations(config)?;
        self.registry().reload(registrations)?;
        Ok(())
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: VellumConfig,
    catalog: PluginCatalog,
    store: Arc<dyn DocumentStore>,
    authentication: AuthenticationStage,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Sets the authenticator.
    pub fn authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authentication = AuthenticationStage::new(authenticator);
        self
    }

    /// Validates the configuration and assembles the engine.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;

        let resources = ResourceCatalog::from_config(&self.config);
        let registry = Arc::new(PluginRegistry::with_registrations(self.catalog.registrations(&self.config)?)?);
        tracing::debug!(collections = resources.len(), plugins = registry.snapshot().len(), "engine assembled");

        let pipeline = Pipeline::builder(ResourceHandler::new(self.store))
            .registry(registry)
            .routing(RoutingStage::new(resources))
            .authentication(self.authentication)
            .build();

        Ok(Engine {
            catalog: self.catalog,
            pipeline,
            lifecycle: AtomicU8::new(IDLE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_config::ConfigLoader;
    use vellum_store::InMemoryStore;

    #[test]
    fn test_log_config_mapping() {
        let logging = LoggingConfig {
            level: "vellum_store=debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            ..LoggingConfig::default()
        };
        let mapped = log_config(&logging);
        assert!(!mapped.json_format);
        assert!(mapped.file_line_info);
        assert_eq!(mapped.level, "vellum_store=debug");

        assert!(log_config(&LoggingConfig::default()).json_format);
    }

    #[test]
    fn test_build_rejects_unknown_plugin() {
        let config = ConfigLoader::new()
            .with_overrides("/plugins/ghost->{priority: 1}")
            .unwrap()
            .load()
            .unwrap();
        let err = Engine::from_config(config, PluginCatalog::new(), Arc::new(InMemoryStore::new())).unwrap_err();
        assert!(matches!(err, EngineError::Registry(_)));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let engine =
            Engine::from_config(VellumConfig::default(), PluginCatalog::new(), Arc::new(InMemoryStore::new())).unwrap();
        assert!(!engine.is_started());
        engine.start().await.unwrap();
        assert!(engine.is_started());
        assert!(matches!(engine.start().await, Err(EngineError::AlreadyStarted)));
    }
}
