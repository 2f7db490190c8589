//! Registry error types.

use crate::InterceptPoint;
use thiserror::Error;
use vellum_core::SyntaxError;

/// Errors raised while building or updating the plugin registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The handler kind does not fit the interception point.
    #[error("plugin `{name}` cannot run at {point}: {reason}")]
    PointMismatch {
        /// Plugin name.
        name: String,
        /// Requested point.
        point: InterceptPoint,
        /// What kind of handler the point needs.
        reason: &'static str,
    },

    /// A plugin with the same name is already registered.
    #[error("plugin `{0}` is already registered")]
    DuplicateName(String),

    /// Configuration names a plugin the catalog does not know.
    #[error("unknown plugin `{0}`")]
    UnknownPlugin(String),

    /// The configured predicate does not parse.
    #[error("invalid predicate for plugin `{name}`: {source}")]
    InvalidPredicate {
        /// Plugin name.
        name: String,
        /// Parse failure.
        #[source]
        source: SyntaxError,
    },

    /// A plugin factory rejected its arguments.
    #[error("cannot build plugin `{name}`: {message}")]
    Factory {
        /// Plugin name.
        name: String,
        /// Why construction failed.
        message: String,
    },
}

impl RegistryError {
    /// Create a new factory error.
    pub fn factory(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Factory {
            name: name.into(),
            message: message.into(),
        }
    }
}
