//! Configuration section types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vellum_core::DocIdType;

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive (e.g. `info`, `vellum_store=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

/// Defaults applied to collections without an explicit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ResourceDefaults {
    /// Id type of documents.
    #[serde(default)]
    pub id_type: DocIdType,

    /// Whether writes must present the current ETag.
    #[serde(default)]
    pub etag_check: bool,
}

/// Per-collection settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Id type of documents; falls back to [`ResourceDefaults::id_type`].
    #[serde(default)]
    pub id_type: Option<DocIdType>,

    /// Concurrency check policy; falls back to [`ResourceDefaults::etag_check`].
    #[serde(default)]
    pub etag_check: Option<bool>,
}

/// Per-plugin settings, keyed by the plugin's catalog name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Whether the plugin is registered.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Execution priority; lower runs first. Falls back to the plugin's default.
    #[serde(default)]
    pub priority: Option<i32>,

    /// Applicability predicate text; absent means always applicable.
    #[serde(default)]
    pub predicate: Option<String>,

    /// Free-form arguments handed to the plugin factory.
    #[serde(default)]
    pub args: Value,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: None,
            predicate: None,
            args: Value::Null,
        }
    }
}
