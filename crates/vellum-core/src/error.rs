//! Error types for Vellum.
//!
//! [`VellumError`] is the request-path taxonomy. Every member maps to one
//! response status; the write-path members (`InvalidPayload`,
//! `ReservedIdentifier`, `MissingIdentifier`, `PreconditionFailed`,
//! `DuplicateKey`) are expected, user-facing outcomes while
//! `StoreUnavailable` and `Internal` are infrastructure failures.
//!
//! | Variant | Status |
//! |---|---|
//! | `Syntax` | 400 |
//! | `InvalidPayload` | 406 |
//! | `ReservedIdentifier` | 403 |
//! | `MissingIdentifier` | 406 |
//! | `PreconditionFailed` | 409 (token missing) / 412 (token mismatch) |
//! | `DuplicateKey` | 417 |
//! | `StoreUnavailable` | 503 |
//! | `NotReady` | 503 |
//! | `NotFound` | 404 |
//! | `MethodNotAllowed` | 405 |
//! | `Unauthenticated` | 401 |
//! | `Forbidden` | 403 |
//! | `Internal` | 500 |
//!
//! [`SyntaxError`] is shared by the override-directive and predicate parsers.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`VellumError`].
pub type VellumResult<T> = Result<T, VellumError>;

/// Message sent to clients in place of internal failure details.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Malformed directive or predicate text.
///
/// Fatal at parse time; nothing built from the offending text is ever
/// partially applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error: {message} in `{input}`")]
pub struct SyntaxError {
    /// What was wrong.
    pub message: String,
    /// The offending input fragment.
    pub input: String,
}

impl SyntaxError {
    /// Creates a syntax error for the given input fragment.
    #[must_use]
    pub fn new(message: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            input: input.into(),
        }
    }
}

/// Standard error type for the request path.
///
/// # Example
///
/// ```
/// use vellum_core::VellumError;
/// use http::StatusCode;
///
/// let err = VellumError::duplicate_key("E11000 duplicate key error");
/// assert_eq!(err.status_code(), StatusCode::EXPECTATION_FAILED);
/// assert!(!err.is_retryable());
/// ```
#[derive(Error, Debug)]
pub enum VellumError {
    /// Malformed directive or predicate text.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The request payload has the wrong shape (e.g. an array where a
    /// document is required).
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Human-readable error message.
        message: String,
    },

    /// The supplied identifier collides with a reserved identifier.
    #[error("Reserved identifier: {id}")]
    ReservedIdentifier {
        /// The offending identifier.
        id: String,
    },

    /// No identifier supplied for an id type that cannot be generated.
    #[error("Missing identifier: {message}")]
    MissingIdentifier {
        /// Human-readable error message.
        message: String,
    },

    /// The concurrency token check failed.
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Human-readable error message.
        message: String,
        /// Whether the client supplied a token at all.
        token_supplied: bool,
    },

    /// The store rejected the mutation on an identifier uniqueness collision.
    #[error("Duplicate key: {message}")]
    DuplicateKey {
        /// Human-readable error message.
        message: String,
    },

    /// The store could not be reached or failed transiently.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The engine is not accepting requests yet.
    #[error("Not ready: {message}")]
    NotReady {
        /// Human-readable error message.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The method is not supported by the addressed resource.
    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected method.
        method: String,
    },

    /// No acceptable credentials.
    #[error("Authentication error: {message}")]
    Unauthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// Authenticated but not permitted.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected failure inside a handler or plugin.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message (logged, never sent to clients).
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl VellumError {
    /// Creates an invalid payload error.
    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a reserved identifier error.
    #[must_use]
    pub fn reserved_identifier(id: impl Into<String>) -> Self {
        Self::ReservedIdentifier { id: id.into() }
    }

    /// Creates a missing identifier error.
    #[must_use]
    pub fn missing_identifier(message: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            message: message.into(),
        }
    }

    /// Creates a precondition failure.
    #[must_use]
    pub fn precondition_failed(message: impl Into<String>, token_supplied: bool) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
            token_supplied,
        }
    }

    /// Creates a duplicate key error.
    #[must_use]
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::DuplicateKey {
            message: message.into(),
        }
    }

    /// Creates a store unavailable error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a not ready error.
    #[must_use]
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method not allowed error.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Syntax(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPayload { .. } | Self::MissingIdentifier { .. } => {
                StatusCode::NOT_ACCEPTABLE
            }
            Self::ReservedIdentifier { .. } | Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::PreconditionFailed {
                token_supplied: false,
                ..
            } => StatusCode::CONFLICT,
            Self::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            Self::DuplicateKey { .. } => StatusCode::EXPECTATION_FAILED,
            Self::StoreUnavailable { .. } | Self::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SYNTAX_ERROR",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::ReservedIdentifier { .. } => "RESERVED_IDENTIFIER",
            Self::MissingIdentifier { .. } => "MISSING_IDENTIFIER",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::NotReady { .. } => "NOT_READY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::Unauthenticated { .. } => "AUTHENTICATION_ERROR",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    ///
    /// Only transient store failures qualify. Precondition and duplicate-key
    /// failures are semantic: retrying them verbatim cannot succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns the message that may be shown to clients.
    ///
    /// Internal failures are replaced by a generic message.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal { .. } => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serializable error envelope for responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error detail.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}
