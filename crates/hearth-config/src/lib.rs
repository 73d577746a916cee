//! Layered configuration for Hearth.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hearth_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("catalog: {}", resolved.config.catalog.url);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`HEARTH_CATALOG_URL`, `HEARTH_DEFAULT_ENV`, `HEARTH_LOG`)
//! 2. **User** (`<home>/config.toml`)
//! 3. **System** (`/etc/hearth/config.toml`)
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! The home directory itself comes from `--home`, then `HEARTH_HOME`, then
//! `~/.hearth`.
//!
//! This crate has no dependencies on other hearth crates. Conversion to
//! domain types happens in the CLI's bridge module.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with provenance.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigSources;
pub use merge::{ConfigLayer, FieldSources};
pub use show::ResolvedConfig;
pub use types::*;

impl Config {
    /// Load configuration for the current process.
    ///
    /// # Errors
    ///
    /// See [`loader::load`].
    pub fn load(home_override: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(&ConfigSources::from_process(home_override))
    }
}
