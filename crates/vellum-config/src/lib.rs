//! Typed configuration and override directives for Vellum.
//!
//! This crate provides:
//! - [`VellumConfig`], the typed configuration tree (logging, served
//!   collections, plugin settings)
//! - [`ConfigLoader`], a layered loader (defaults → file → env → directives)
//! - The override directive language ([`parse_overrides`]), which overlays
//!   single locations of the configuration tree
//!
//! # Configuration File Format
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [defaults]
//! id_type = "oid"
//! etag_check = false
//!
//! [resources.users]
//! id_type = "string"
//! etag_check = true
//!
//! [plugins.audit]
//! priority = 10
//! predicate = "field-exists(owner)"
//! args = { header = "X-Audit" }
//! ```
//!
//! # Override Directives
//!
//! ```
//! use vellum_config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_overrides("/resources/users->{id_type: 'string'};/plugins/audit/priority->1")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! assert_eq!(config.plugins["audit"].priority, Some(1));
//! ```
//!
//! Environment variables `PREFIX__SECTION__KEY=value` become directives of
//! `/section/key`, and `PREFIX_OVERRIDES` may carry a full directive string.

#![doc(html_root_url = "https://docs.rs/vellum-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod overrides;
mod schema;

pub use config::VellumConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use overrides::{apply_overrides, parse_overrides, parse_value, OverrideDirective, OverrideValue};
pub use schema::{LogFormat, LoggingConfig, PluginConfig, ResourceConfig, ResourceDefaults};
