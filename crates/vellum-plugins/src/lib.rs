//! # Vellum Plugins
//!
//! Interception points, the plugin capability traits and the registry that
//! decides which plugins run for an exchange.
//!
//! - [`InterceptPoint`] - Request and process lifecycle stages
//! - [`Interceptor`], [`Initializer`] - What a plugin can do at each kind of point
//! - [`PluginRegistration`] - Name, point, priority, optional predicate and handler
//! - [`PluginRegistry`] - Lock-free snapshots with atomic reload
//! - [`PluginCatalog`] - Builds registrations from configuration
//!
//! Resolution filters registrations by point, keeps those whose predicate
//! holds for the exchange's request document, and orders them by priority
//! (lower first), then registration order.

#![doc(html_root_url = "https://docs.rs/vellum-plugins/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod error;
mod plugin;
mod point;
mod registry;

pub use catalog::PluginCatalog;
pub use error::RegistryError;
pub use plugin::{BoxFuture, Flow, Initializer, Interceptor, PluginHandler, PluginRegistration};
pub use point::InterceptPoint;
pub use registry::{PluginRegistry, RegistrySnapshot};
