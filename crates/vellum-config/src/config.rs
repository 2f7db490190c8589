//! Main configuration type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vellum_core::ResourceRef;
use vellum_predicate::Predicate;

use crate::{ConfigError, LoggingConfig, PluginConfig, ResourceConfig, ResourceDefaults};

/// Complete Vellum configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to assemble it from defaults,
/// files, environment variables and override directives.
///
/// # Example
///
/// ```
/// use vellum_config::VellumConfig;
///
/// let config = VellumConfig::default();
/// assert_eq!(config.logging.level, "info");
/// assert!(config.resources.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct VellumConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults for collections.
    #[serde(default)]
    pub defaults: ResourceDefaults,

    /// Served collections, by name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,

    /// Plugin settings, by catalog name.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginConfig>,
}

impl VellumConfig {
    /// Resolves a served collection, applying [`ResourceDefaults`].
    ///
    /// Returns `None` for collections that are not configured.
    #[must_use]
    pub fn resource(&self, collection: &str) -> Option<ResourceRef> {
        self.resources.get(collection).map(|config| {
            ResourceRef::collection(
                collection,
                config.id_type.unwrap_or(self.defaults.id_type),
            )
            .with_etag_check(config.etag_check.unwrap_or(self.defaults.etag_check))
        })
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The log level is empty
    /// - A collection name is empty or contains `/`
    /// - A plugin predicate does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        for name in self.resources.keys() {
            if name.is_empty() || name.contains('/') {
                return Err(ConfigError::invalid_value(
                    format!("resources.{name}"),
                    "collection names must be non-empty and contain no `/`",
                ));
            }
        }

        for (name, plugin) in &self.plugins {
            if let Some(text) = &plugin.predicate {
                Predicate::parse(text).map_err(|e| {
                    ConfigError::invalid_value(format!("plugins.{name}.predicate"), e.to_string())
                })?;
            }
        }

        Ok(())
    }
}
