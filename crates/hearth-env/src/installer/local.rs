//! Local-directory installer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hearth_core::{CancellationToken, CatalogEntry, HearthError, HearthResult};
use tracing::debug;
use walkdir::WalkDir;

use super::Installer;

/// Local filesystem path named by a `file://` URL or an absolute path.
#[must_use]
pub fn local_path(source_ref: &str) -> Option<PathBuf> {
    if let Some(rest) = source_ref.strip_prefix("file://") {
        let path = PathBuf::from(rest);
        return path.is_absolute().then_some(path);
    }
    let path = PathBuf::from(source_ref);
    path.is_absolute().then_some(path)
}

/// Copies a local directory (or single file) into staging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInstaller;

#[async_trait]
impl Installer for LocalInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> HearthResult<()> {
        let package = entry.name.to_string();
        let source = local_path(&entry.source_ref).ok_or_else(|| HearthError::InstallFailed {
            package: package.clone(),
            reason: format!("'{}' is not a local path", entry.source_ref),
        })?;
        debug!(package = %entry.name, source = %source.display(), "Copying local package");

        let staging = staging.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || copy_tree(&package, &source, &staging, &cancel))
            .await
            .map_err(|e| HearthError::InstallFailed {
                package: entry.name.to_string(),
                reason: format!("copy task failed: {e}"),
            })?
    }
}

fn copy_tree(
    package: &str,
    source: &Path,
    staging: &Path,
    cancel: &CancellationToken,
) -> HearthResult<()> {
    let failed = |reason: String| HearthError::InstallFailed {
        package: package.to_string(),
        reason,
    };

    let metadata = std::fs::metadata(source)
        .map_err(|e| failed(format!("cannot read {}: {e}", source.display())))?;

    if metadata.is_file() {
        let file_name = source
            .file_name()
            .ok_or_else(|| failed(format!("{} has no file name", source.display())))?;
        std::fs::copy(source, staging.join(file_name))
            .map_err(|e| failed(format!("copy failed: {e}")))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).follow_links(false).min_depth(1) {
        if cancel.is_cancelled() {
            return Err(HearthError::Cancelled("local install".to_string()));
        }

        let entry = entry.map_err(|e| failed(format!("walk failed: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| failed(format!("walk escaped source: {e}")))?;
        let target = staging.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            // Parents are walked first; never recreate a vanished staging dir.
            std::fs::create_dir(&target)
                .map_err(|e| failed(format!("cannot create {}: {e}", target.display())))?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| failed(format!("cannot copy {}: {e}", entry.path().display())))?;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
    Ok(())
}
