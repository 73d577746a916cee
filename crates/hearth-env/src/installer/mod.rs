//! Artifact production for a resolved catalog entry.
//!
//! The manager owns staging directories and the commit. An [`Installer`]
//! only fills the staging directory it is handed, or fails.

mod git;
mod local;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use hearth_core::{CancellationToken, CatalogEntry, HearthError, HearthResult};

pub use git::{GitInstaller, GitSource};
pub use local::{LocalInstaller, local_path};

/// Produces a package's artifacts into a staging directory.
#[async_trait]
pub trait Installer: Send + Sync + fmt::Debug {
    /// Write the artifacts for `entry` under `staging`.
    ///
    /// `staging` exists and is empty. Implementations should observe
    /// `cancel` at their suspension points.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::InstallFailed`] (or `Cancelled`) on failure.
    /// Partial output in `staging` is cleaned up by the caller.
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> HearthResult<()>;
}

/// Dispatches on the `sourceRef` scheme to the git or local installer.
#[derive(Debug, Clone, Default)]
pub struct SourceInstaller {
    git: GitInstaller,
    local: LocalInstaller,
}

impl SourceInstaller {
    /// Build a dispatcher around a configured git installer.
    #[must_use]
    pub fn new(git: GitInstaller) -> Self {
        Self {
            git,
            local: LocalInstaller,
        }
    }
}

#[async_trait]
impl Installer for SourceInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> HearthResult<()> {
        if GitSource::looks_like_git(&entry.source_ref) {
            return self.git.install(entry, staging, cancel).await;
        }
        if local_path(&entry.source_ref).is_some() {
            return self.local.install(entry, staging, cancel).await;
        }
        Err(HearthError::InstallFailed {
            package: entry.name.to_string(),
            reason: format!("unsupported source '{}'", entry.source_ref),
        })
    }
}
