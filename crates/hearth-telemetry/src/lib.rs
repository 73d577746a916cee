//! Hearth Telemetry - logging setup for the Hearth runtime and CLI.
//!
//! # Example
//!
//! ```rust,no_run
//! use hearth_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hearth_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("hearth_env=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!(environment = "default", "Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
