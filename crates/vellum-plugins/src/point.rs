//! Interception points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A lifecycle stage at which plugins run.
///
/// The first five points belong to one request and run against an
/// [`Exchange`](vellum_core::Exchange); the last two run once per process
/// start and take no exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptPoint {
    /// Before the exchange is authenticated.
    BeforeAuth,
    /// After a successful authentication.
    AfterAuth,
    /// Right before the resource handler.
    BeforeHandler,
    /// Right after the resource handler.
    AfterHandler,
    /// Before the response is written out.
    BeforeResponseCommit,
    /// Before the engine starts serving.
    BeforeStartup,
    /// After the engine started serving.
    AfterStartup,
}

impl InterceptPoint {
    /// Every point, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::BeforeAuth,
        Self::AfterAuth,
        Self::BeforeHandler,
        Self::AfterHandler,
        Self::BeforeResponseCommit,
        Self::BeforeStartup,
        Self::AfterStartup,
    ];

    /// Returns the configuration name of this point.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAuth => "before_auth",
            Self::AfterAuth => "after_auth",
            Self::BeforeHandler => "before_handler",
            Self::AfterHandler => "after_handler",
            Self::BeforeResponseCommit => "before_response_commit",
            Self::BeforeStartup => "before_startup",
            Self::AfterStartup => "after_startup",
        }
    }

    /// Whether this point runs per request.
    #[must_use]
    pub const fn is_request_point(self) -> bool {
        !matches!(self, Self::BeforeStartup | Self::AfterStartup)
    }
}

impl fmt::Display for InterceptPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterceptPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown interception point: {s}"))
    }
}
