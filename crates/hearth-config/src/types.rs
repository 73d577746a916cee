//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially specified file still deserializes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete Hearth configuration after all layers are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resolved home directory. Filled in by the loader, never read from a file.
    pub home: PathBuf,
    /// Environment a fresh session binds to.
    pub default_environment: String,
    /// Remote catalog settings.
    pub catalog: CatalogSection,
    /// Installer settings.
    pub install: InstallSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: PathBuf::new(),
            default_environment: "default".to_owned(),
            catalog: CatalogSection::default(),
            install: InstallSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// `[catalog]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// Catalog location: `https://…`, `file://…`, or an absolute path.
    pub url: String,
    /// How long a fetched catalog stays fresh.
    pub freshness_secs: u64,
    /// Request timeout for remote fetches.
    pub timeout_secs: u64,
    /// Serve a stale catalog when a refresh fails.
    pub allow_stale: bool,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            url: "https://catalog.hearth.dev/v1/packages.json".to_owned(),
            freshness_secs: 30,
            timeout_secs: 30,
            allow_stale: false,
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSection {
    /// Deadline for a single install, in seconds. `0` disables the deadline.
    pub timeout_secs: u64,
    /// Git executable used by the git installer.
    pub git_binary: String,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            git_binary: "git".to_owned(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter.
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Where records go: `stderr`, `stdout`, or `file` (daily files under
    /// `<home>/logs`).
    pub target: String,
    /// Per-target directive overrides.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directives: Vec::new(),
        }
    }
}
