//! Environment variable overrides.
//!
//! Variables are passed in as a map so loading stays deterministic under
//! test; [`collect_env_vars`] snapshots the process environment once.

use std::collections::HashMap;

use crate::merge::{ConfigLayer, FieldSources, set_path};

/// Overrides the home directory.
pub const HOME_VAR: &str = "HEARTH_HOME";

/// Mapping from environment variable to dotted config path.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HEARTH_CATALOG_URL", "catalog.url"),
    ("HEARTH_DEFAULT_ENV", "default_environment"),
    ("HEARTH_LOG", "logging.level"),
];

/// Snapshot the `HEARTH_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("HEARTH_"))
        .collect()
}

/// Apply every non-empty override in `env_vars` to `merged`.
///
/// Returns how many overrides were applied.
pub fn apply_env_overrides(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied: usize = 0;
    for (var, path) in ENV_OVERRIDES {
        let Some(value) = env_vars.get(*var) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        set_path(
            merged,
            path,
            toml::Value::String(value.to_owned()),
            &ConfigLayer::Environment,
            sources,
        );
        applied = applied.saturating_add(1);
    }
    applied
}
