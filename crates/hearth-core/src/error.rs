//! Error taxonomy shared by every Hearth component.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by environment, package, and catalog operations.
///
/// Every variant reaches the caller as a typed failure. Nothing in the core
/// swallows one of these; the only local recovery is catalog caching and
/// coalescing of concurrent manager construction.
#[derive(Debug, Error)]
pub enum HearthError {
    /// An environment or package identifier failed validation.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        /// What was being named (`environment`, `package`).
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The storage backend failed (permissions, disk full, missing root).
    #[error("storage error at {path}: {message}")]
    Storage {
        /// Path the failing operation touched.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The environment cannot be deleted because sessions are bound to it.
    #[error("environment '{name}' is in use by {sessions} session(s)")]
    EnvironmentInUse {
        /// The environment name.
        name: String,
        /// Number of sessions currently bound.
        sessions: usize,
    },

    /// No environment with this name exists.
    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    /// Explicit creation of an environment that already exists.
    #[error("environment already exists: {0}")]
    EnvironmentExists(String),

    /// The durable package index could not be parsed.
    ///
    /// Fatal for the affected environment's manager until the file is
    /// repaired; other environments are unaffected.
    #[error("package index corrupt at {path}: {message}")]
    IndexCorrupt {
        /// Path to the index file.
        path: PathBuf,
        /// Parse or consistency failure.
        message: String,
    },

    /// The catalog has no entry for this package name.
    #[error("package not found in catalog: {0}")]
    PackageNotFound(String),

    /// The catalog lists the package but not the requested version.
    #[error("version {version} of {name} not found in catalog")]
    VersionNotFound {
        /// Package name.
        name: String,
        /// The version that was requested.
        version: String,
    },

    /// Removal of a package that has no installed record.
    #[error("package '{name}' is not installed in environment '{environment}'")]
    PackageNotInstalled {
        /// Package name.
        name: String,
        /// Environment that was searched.
        environment: String,
    },

    /// The remote catalog could not be fetched or had an invalid shape.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The installer collaborator failed to produce artifacts.
    #[error("install of {package} failed: {reason}")]
    InstallFailed {
        /// Package being installed.
        package: String,
        /// Failure reason reported by the installer.
        reason: String,
    },

    /// The operation observed its cancellation token.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// The operation ran past its deadline.
    #[error("{operation} exceeded its deadline of {limit:?}")]
    DeadlineExceeded {
        /// The operation that timed out.
        operation: String,
        /// The deadline that elapsed.
        limit: Duration,
    },

    /// A component was given an unusable setting (bad catalog URL, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl HearthError {
    /// Wrap an I/O error together with the path it concerned.
    pub fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this failure is local to one environment's index.
    #[must_use]
    pub fn is_index_corrupt(&self) -> bool {
        matches!(self, Self::IndexCorrupt { .. })
    }
}

/// Result type for Hearth operations.
pub type HearthResult<T> = Result<T, HearthError>;
