//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;
use vellum_core::SyntaxError;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error, also raised when the merged tree does not fit the typed schema.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Malformed override directive text.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// A directive could not be applied to the configuration tree.
    #[error("cannot apply override at {path}: {reason}")]
    InvalidOverride {
        /// Directive path.
        path: String,
        /// Why the directive does not fit the tree.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// Validation error after loading.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new override application error.
    pub fn invalid_override(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = ConfigError::file_not_found("/path/to/vellum.toml");
        assert!(err.to_string().contains("/path/to/vellum.toml"));
    }

    #[test]
    fn test_invalid_override_error() {
        let err = ConfigError::invalid_override("/a/b", "`a` is not a container");
        assert!(err.to_string().contains("/a/b"));
        assert!(err.to_string().contains("not a container"));
    }

    #[test]
    fn test_syntax_error_is_transparent() {
        let err: ConfigError = SyntaxError::new("missing `->`", "/a/b").into();
        assert_eq!(err.to_string(), SyntaxError::new("missing `->`", "/a/b").to_string());
    }

    #[test]
    fn test_env_parse_error() {
        let err = ConfigError::env_parse_error("VELLUM__LOGGING__LEVEL", "invalid key format");
        assert!(err.to_string().contains("VELLUM__LOGGING__LEVEL"));
    }
}
