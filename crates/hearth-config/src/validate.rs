//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest accepted environment name. Mirrors the core identifier rule.
const MAX_ENVIRONMENT_NAME_LEN: usize = 64;

/// Upper bound on the catalog freshness window (one day).
const MAX_FRESHNESS_SECS: u64 = 86_400;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_default_environment(config)?;
    validate_catalog(config)?;
    validate_install(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message,
    }
}

fn validate_default_environment(config: &Config) -> ConfigResult<()> {
    let name = &config.default_environment;
    if name.is_empty() || name.len() > MAX_ENVIRONMENT_NAME_LEN {
        return Err(invalid(
            "default_environment",
            format!("must be 1 to {MAX_ENVIRONMENT_NAME_LEN} characters"),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            "default_environment",
            format!("'{name}' may contain only ASCII letters, digits, '_' and '-'"),
        ));
    }
    Ok(())
}

fn validate_catalog(config: &Config) -> ConfigResult<()> {
    let c = &config.catalog;

    if c.url.trim().is_empty() {
        return Err(invalid("catalog.url", "must not be empty".to_owned()));
    }
    let scheme_ok = c.url.starts_with("https://")
        || c.url.starts_with("http://")
        || c.url.starts_with("file://")
        || c.url.starts_with('/');
    if !scheme_ok {
        return Err(invalid(
            "catalog.url",
            format!(
                "'{}' must be an http(s):// or file:// URL, or an absolute path",
                c.url
            ),
        ));
    }

    if c.freshness_secs > MAX_FRESHNESS_SECS {
        return Err(invalid(
            "catalog.freshness_secs",
            format!(
                "{} exceeds the maximum of {MAX_FRESHNESS_SECS}",
                c.freshness_secs
            ),
        ));
    }

    if c.timeout_secs == 0 {
        return Err(invalid(
            "catalog.timeout_secs",
            "must be greater than 0".to_owned(),
        ));
    }
    Ok(())
}

fn validate_install(config: &Config) -> ConfigResult<()> {
    if config.install.git_binary.trim().is_empty() {
        return Err(invalid(
            "install.git_binary",
            "must not be empty".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: trace, debug, info, warn, error, off",
                l.level
            ),
        ));
    }

    if !matches!(
        l.format.to_ascii_lowercase().as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }

    if !matches!(
        l.target.to_ascii_lowercase().as_str(),
        "stderr" | "stdout" | "file"
    ) {
        return Err(invalid(
            "logging.target",
            format!(
                "unknown target '{}'; expected one of: stderr, stdout, file",
                l.target
            ),
        ));
    }
    Ok(())
}
