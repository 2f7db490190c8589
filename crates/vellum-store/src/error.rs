//! Store error types.

use thiserror::Error;
use vellum_core::VellumError;

/// Errors reported by a [`DocumentStore`](crate::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The concurrency token check failed; nothing was mutated.
    #[error("{message}")]
    PreconditionFailed {
        /// Human-readable error message.
        message: String,
        /// Whether the client supplied a token.
        token_supplied: bool,
    },

    /// The mutation collided with an existing identifier.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The store is unreachable or failed transiently.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl StoreError {
    /// The token was required but not supplied.
    pub fn token_missing() -> Self {
        Self::PreconditionFailed {
            message: "the document's ETag must be provided using the If-Match header".to_string(),
            token_supplied: false,
        }
    }

    /// The supplied token does not match the stored one.
    pub fn token_mismatch() -> Self {
        Self::PreconditionFailed {
            message: "the If-Match token does not match the document's current ETag".to_string(),
            token_supplied: true,
        }
    }

    /// A token was supplied for a document that does not exist.
    pub fn token_for_absent_document() -> Self {
        Self::PreconditionFailed {
            message: "an If-Match token was supplied but the document does not exist".to_string(),
            token_supplied: true,
        }
    }

    /// Create a new unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Short label used for logs and metrics.
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::NotFound(_) => "not_found",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<StoreError> for VellumError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PreconditionFailed {
                message,
                token_supplied,
            } => Self::precondition_failed(message, token_supplied),
            StoreError::DuplicateKey(message) => Self::duplicate_key(message),
            StoreError::NotFound(message) => Self::not_found(message),
            StoreError::Unavailable { message, source } => Self::StoreUnavailable { message, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_precondition_status_depends_on_token() {
        let missing: VellumError = StoreError::token_missing().into();
        assert_eq!(missing.status_code(), StatusCode::CONFLICT);

        let mismatch: VellumError = StoreError::token_mismatch().into();
        assert_eq!(mismatch.status_code(), StatusCode::PRECONDITION_FAILED);

        let absent: VellumError = StoreError::token_for_absent_document().into();
        assert_eq!(absent.status_code(), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn test_duplicate_key_maps_to_expectation_failed() {
        let err: VellumError = StoreError::DuplicateKey("_id".into()).into();
        assert_eq!(err.status_code(), StatusCode::EXPECTATION_FAILED);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let err: VellumError = StoreError::unavailable("connection reset").into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
    }
}
