//! Logging setup for Vellum.
//!
//! Every Vellum crate logs through `tracing` macros with structured fields
//! (`request_id`, `plugin`, `point`, `collection`, `status`). This crate
//! installs the process-wide subscriber that turns those events into output:
//! JSON lines for production, pretty text for development.
//!
//! ```rust,ignore
//! use vellum_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(collection = "users", "serving");
//! ```

#![doc(html_root_url = "https://docs.rs/vellum-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
