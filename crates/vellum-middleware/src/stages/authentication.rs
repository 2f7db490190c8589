//! Authentication stage.
//!
//! Credential checking is delegated to an [`Authenticator`]; the stage only
//! records the resulting [`Identity`] on the exchange.

use crate::middleware::{BoxFuture, Middleware};
use std::sync::Arc;
use vellum_core::{Exchange, Identity, VellumError};

/// Header carrying the user id set by a trusted upstream proxy.
pub const USER_HEADER: &str = "x-vellum-user";

/// Header carrying comma-separated roles set by a trusted upstream proxy.
pub const ROLES_HEADER: &str = "x-vellum-roles";

/// Establishes the caller identity of an exchange.
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the caller identity, or `Unauthenticated`.
    fn authenticate<'a>(&'a self, exchange: &'a Exchange) -> BoxFuture<'a, Result<Identity, VellumError>>;
}

/// Accepts every caller as [`Identity::Anonymous`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthenticator;

impl Authenticator for AnonymousAuthenticator {
    fn authenticate<'a>(&'a self, _exchange: &'a Exchange) -> BoxFuture<'a, Result<Identity, VellumError>> {
        Box::pin(async { Ok(Identity::Anonymous) })
    }
}

/// Trusts identity headers set by an upstream proxy.
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    user_header: String,
    roles_header: String,
}

impl Default for HeaderAuthenticator {
    fn default() -> Self {
        Self {
            user_header: USER_HEADER.to_string(),
            roles_header: ROLES_HEADER.to_string(),
        }
    }
}

impl HeaderAuthenticator {
    /// Uses the default header names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses custom header names.
    pub fn with_headers(user_header: impl Into<String>, roles_header: impl Into<String>) -> Self {
        Self {
            user_header: user_header.into(),
            roles_header: roles_header.into(),
        }
    }

    fn identity(&self, exchange: &Exchange) -> Result<Identity, VellumError> {
        let headers = exchange.request_headers();
        let user = headers
            .get(self.user_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| VellumError::unauthenticated(format!("missing {} header", self.user_header)))?;

        let roles = headers
            .get(self.roles_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Identity::user(user, roles))
    }
}

impl Authenticator for HeaderAuthenticator {
    fn authenticate<'a>(&'a self, exchange: &'a Exchange) -> BoxFuture<'a, Result<Identity, VellumError>> {
        Box::pin(async move { self.identity(exchange) })
    }
}

/// The authentication stage.
#[derive(Clone)]
pub struct AuthenticationStage {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenticationStage {
    /// Creates the stage over `authenticator`.
    pub fn new(authenticator: impl Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}

impl Default for AuthenticationStage {
    fn default() -> Self {
        Self::new(AnonymousAuthenticator)
    }
}

impl std::fmt::Debug for AuthenticationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationStage").finish_non_exhaustive()
    }
}

impl Middleware for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<(), VellumError>> {
        Box::pin(async move {
            let identity = self.authenticator.authenticate(exchange).await?;
            tracing::debug!(
                request_id = %exchange.request_id(),
                identity = %identity.log_id(),
                "caller authenticated"
            );
            exchange.set_identity(identity);
            Ok(())
        })
    }
}
