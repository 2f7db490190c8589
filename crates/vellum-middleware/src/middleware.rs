//! Core middleware trait.
//!
//! The three core stages that own pipeline logic (routing, authentication and
//! the resource handler) implement [`Middleware`]. A stage either mutates the
//! exchange and returns `Ok(())` to forward, or declines to forward by
//! recording an error or calling [`Exchange::stop`].
//!
//! # Example
//!
//! ```
//! use vellum_core::{Exchange, VellumError};
//! use vellum_middleware::{BoxFuture, Middleware};
//!
//! struct ReadOnly;
//!
//! impl Middleware for ReadOnly {
//!     fn name(&self) -> &'static str {
//!         "read_only"
//!     }
//!
//!     fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
//!         Box::pin(async move {
//!             if exchange.method() != http::Method::GET {
//!                 return Err(VellumError::method_not_allowed(exchange.method().as_str()));
//!             }
//!             exchange.set_status(http::StatusCode::NO_CONTENT);
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use vellum_core::{Exchange, VellumError};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A core pipeline stage.
///
/// # Invariants
///
/// - An `Err` moves the exchange to `Errored`; its taxonomy status is kept
///   and internal causes are hidden from the client
/// - A stage MUST NOT commit the response itself
pub trait Middleware: Send + Sync + 'static {
    /// Returns the stage name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the exchange.
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>>;
}

/// A middleware built from a function.
///
/// ```
/// use vellum_core::{Exchange, VellumError};
/// use vellum_middleware::{BoxFuture, FnMiddleware, Middleware};
///
/// fn teapot(exchange: &mut Exchange) -> BoxFuture<'_, Result<(), VellumError>> {
///     Box::pin(async move {
///         exchange.set_status(http::StatusCode::IM_A_TEAPOT);
///         Ok(())
///     })
/// }
///
/// let mw = FnMiddleware::new("teapot", teapot);
/// assert_eq!(mw.name(), "teapot");
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
        (self.func)(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};

    struct Recorder;

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
            Box::pin(async move {
                exchange.set_extension(format!("visited:{}", self.name()));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_middleware_mutates_exchange() {
        let mut exchange = Exchange::new(Method::GET, "/c");
        Recorder.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.get_extension::<String>().unwrap(), "visited:recorder");
    }

    fn accept(exchange: &mut Exchange) -> BoxFuture<'_, Result<(), VellumError>> {
        Box::pin(async move {
            exchange.set_status(StatusCode::ACCEPTED);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let mw = FnMiddleware::new("accept", accept);
        let mut exchange = Exchange::new(Method::POST, "/c");
        mw.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.status(), StatusCode::ACCEPTED);
    }
}
