//! Engine error types.

use thiserror::Error;
use vellum_config::ConfigError;
use vellum_core::VellumError;
use vellum_plugins::RegistryError;
use vellum_telemetry::TelemetryError;

/// Errors raised while assembling, starting or reloading an [`Engine`](crate::Engine).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin registrations could not be built or installed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A `BeforeStartup` initializer failed.
    #[error("initializer `{plugin}` failed: {source}")]
    Startup {
        /// Initializer name.
        plugin: String,
        /// The failure.
        #[source]
        source: VellumError,
    },

    /// `start` was called twice.
    #[error("engine already started")]
    AlreadyStarted,
}
