//! Plugin capabilities and registrations.

use crate::InterceptPoint;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use vellum_core::{Exchange, VellumError};
use vellum_predicate::Predicate;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the pipeline does after an interceptor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next plugin or stage.
    Continue,
    /// Skip the rest of the chain; response commit still runs.
    Stop,
}

/// A plugin running at a request interception point.
///
/// Interceptors may read and mutate the exchange. Expected rejections are
/// recorded on the exchange (e.g. [`Exchange::fail`]) followed by
/// [`Flow::Stop`]; an `Err` is an unexpected failure and becomes a generic
/// server error.
///
/// # Example
///
/// ```
/// use vellum_core::Exchange;
/// use vellum_plugins::{BoxFuture, Flow, Interceptor};
///
/// struct Stamp;
///
/// impl Interceptor for Stamp {
///     fn handle<'a>(
///         &'a self,
///         exchange: &'a mut Exchange,
///     ) -> BoxFuture<'a, Result<Flow, vellum_core::VellumError>> {
///         Box::pin(async move {
///             if let Some(serde_json::Value::Object(doc)) = exchange.content_mut() {
///                 doc.insert("stamped".into(), true.into());
///             }
///             Ok(Flow::Continue)
///         })
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync + 'static {
    /// Handles the exchange.
    fn handle<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, VellumError>>;
}

/// A plugin running once at a process interception point.
pub trait Initializer: Send + Sync + 'static {
    /// Runs the one-time initialization.
    fn init(&self) -> BoxFuture<'_, Result<(), VellumError>>;
}

/// A handler, tagged by the kind of point it can run at.
#[derive(Clone)]
pub enum PluginHandler {
    /// Runs per request.
    Interceptor(Arc<dyn Interceptor>),
    /// Runs at process start.
    Initializer(Arc<dyn Initializer>),
}

impl PluginHandler {
    /// Whether this handler can run at `point`.
    #[must_use]
    pub const fn fits(&self, point: InterceptPoint) -> bool {
        match self {
            Self::Interceptor(_) => point.is_request_point(),
            Self::Initializer(_) => !point.is_request_point(),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Interceptor(_) => "interceptor",
            Self::Initializer(_) => "initializer",
        }
    }
}

impl fmt::Debug for PluginHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// An immutable plugin registration record.
#[derive(Debug, Clone)]
pub struct PluginRegistration {
    name: String,
    point: InterceptPoint,
    priority: i32,
    predicate: Option<Predicate>,
    handler: PluginHandler,
}

impl PluginRegistration {
    /// Creates a registration with priority 0 and no predicate.
    pub fn new(name: impl Into<String>, point: InterceptPoint, handler: PluginHandler) -> Self {
        Self {
            name: name.into(),
            point,
            priority: 0,
            predicate: None,
            handler,
        }
    }

    /// Creates an interceptor registration.
    pub fn interceptor(
        name: impl Into<String>,
        point: InterceptPoint,
        interceptor: impl Interceptor,
    ) -> Self {
        Self::new(name, point, PluginHandler::Interceptor(Arc::new(interceptor)))
    }

    /// Creates an initializer registration.
    pub fn initializer(
        name: impl Into<String>,
        point: InterceptPoint,
        initializer: impl Initializer,
    ) -> Self {
        Self::new(name, point, PluginHandler::Initializer(Arc::new(initializer)))
    }

    /// Sets the priority; lower runs first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Guards the plugin with a predicate over the request document.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interception point.
    pub fn point(&self) -> InterceptPoint {
        self.point
    }

    /// Priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Guarding predicate, if any.
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Handler.
    pub fn handler(&self) -> &PluginHandler {
        &self.handler
    }

    /// Whether the plugin applies to the exchange. No predicate means always.
    pub fn applies_to(&self, exchange: &Exchange) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |p| p.evaluate_exchange(exchange))
    }
}
