//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, environment variables and override
//! directives.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::overrides::{apply_overrides, parse_overrides, parse_value};
use crate::{ConfigError, OverrideDirective, OverrideValue, VellumConfig};

/// Configuration loader with layered approach.
///
/// Layers are collected on an untyped tree, later layers overriding earlier
/// ones:
/// 1. Default values (built into the code)
/// 2. Configuration file or string (TOML or JSON), deep-merged
/// 3. Environment variables `PREFIX__A__B=value`, each one overlaying `/a/b`
/// 4. The directive string in `PREFIX_OVERRIDES`
/// 5. Directives passed to [`with_overrides`](Self::with_overrides)
///
/// The tree is then deserialized into [`VellumConfig`] and validated.
///
/// # Example
///
/// ```no_run
/// use vellum_config::ConfigLoader;
///
/// # fn main() -> Result<(), vellum_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("vellum.toml")?
///     .with_env_prefix("VELLUM")
///     .with_overrides("/logging/level->'debug'")?
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    tree: Value,
    env_prefix: Option<String>,
    overrides: Vec<OverrideDirective>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: Value::Object(Map::new()),
            env_prefix: None,
            overrides: Vec::new(),
        }
    }

    /// Start with default configuration values, discarding loaded layers.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.tree = Value::Object(Map::new());
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats, selected by extension.
    /// The file is deep-merged over what was loaded before.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let layer = match extension.as_deref() {
            Some(format @ ("toml" | "json")) => parse_layer(&content, format)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                )))
            }
        };

        merge_tree(&mut self.tree, layer);
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `"toml"` or `"json"` format.
    ///
    /// # Example
    ///
    /// ```
    /// use vellum_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [resources.users]
    ///     id_type = "string"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.resource("users").is_some());
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = parse_layer(content, &format.to_lowercase())?;
        merge_tree(&mut self.tree, layer);
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// With prefix `VELLUM`, `VELLUM__LOGGING__LEVEL=debug` overlays
    /// `/logging/level` and `VELLUM_OVERRIDES` may hold a directive string.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file for environment variables, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::env_parse_error(".env", e.to_string())),
        }
        Ok(self)
    }

    /// Queue override directives, applied after every other layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Syntax` if the directive text is malformed.
    pub fn with_overrides(mut self, text: &str) -> Result<Self, ConfigError> {
        self.overrides.extend(parse_overrides(text)?);
        Ok(self)
    }

    /// Finalize and return the validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - An environment variable or directive cannot be parsed or applied
    /// - The merged tree does not match the configuration schema
    /// - Configuration validation fails
    pub fn load(self) -> Result<VellumConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Finalize without validation.
    pub fn load_unvalidated(mut self) -> Result<VellumConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let directives = env_overrides(&prefix, env::vars())?;
            apply_overrides(&mut self.tree, &directives)?;
        }
        apply_overrides(&mut self.tree, &self.overrides)?;

        Ok(serde_json::from_value(self.tree)?)
    }
}

fn parse_layer(content: &str, format: &str) -> Result<Value, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::validation_error(format!(
            "unsupported configuration format: {format}"
        ))),
    }
}

// Objects merge key by key; anything else is replaced.
fn merge_tree(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_tree(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

// Collects the environment layer: keyed variables first, sorted by name,
// then the directive string.
fn env_overrides(
    prefix: &str,
    vars: impl Iterator<Item = (String, String)>,
) -> Result<Vec<OverrideDirective>, ConfigError> {
    let keyed_prefix = format!("{prefix}__");
    let directives_var = format!("{prefix}_OVERRIDES");

    let mut keyed = BTreeMap::new();
    let mut directive_text = None;
    for (key, value) in vars {
        if key == directives_var {
            directive_text = Some(value);
        } else if key.starts_with(&keyed_prefix) {
            keyed.insert(key, value);
        }
    }

    let mut directives = keyed
        .iter()
        .map(|(key, value)| env_directive(key, value, prefix))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(text) = directive_text {
        directives.extend(
            parse_overrides(&text)
                .map_err(|e| ConfigError::env_parse_error(&directives_var, e.to_string()))?,
        );
    }
    Ok(directives)
}

fn env_directive(key: &str, value: &str, prefix: &str) -> Result<OverrideDirective, ConfigError> {
    let rest = key
        .strip_prefix(prefix)
        .and_then(|k| k.strip_prefix("__"))
        .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

    let path = format!(
        "/{}",
        rest.split("__")
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("/")
    );
    let value = parse_value(value).unwrap_or_else(|_| OverrideValue::String(value.to_string()));

    OverrideDirective::new(&path, value).map_err(|e| ConfigError::env_parse_error(key, e.to_string()))
}
