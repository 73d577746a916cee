//! Durable record of known environments.
//!
//! Each environment is a directory under `<home>/environments/` holding an
//! `environment.json` metadata file. The metadata file is published with
//! no-clobber semantics, so concurrent first callers of [`EnvironmentStore::ensure`]
//! agree on one `created_at`.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hearth_core::{Environment, EnvironmentName, HearthError, HearthHome, HearthResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Metadata file inside each environment root.
pub const METADATA_FILE_NAME: &str = "environment.json";

#[derive(Debug, Serialize, Deserialize)]
struct EnvironmentMetadata {
    name: EnvironmentName,
    created_at: DateTime<Utc>,
}

/// File-backed environment table.
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    home: HearthHome,
}

impl EnvironmentStore {
    /// Create a store rooted at `home`.
    #[must_use]
    pub fn new(home: HearthHome) -> Self {
        Self { home }
    }

    /// The home this store lives in.
    #[must_use]
    pub fn home(&self) -> &HearthHome {
        &self.home
    }

    /// Storage root for `name`. Does not touch the filesystem.
    #[must_use]
    pub fn root_for(&self, name: &EnvironmentName) -> PathBuf {
        self.home.environment_dir(name)
    }

    /// Return the environment, creating its storage if absent.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if the root or metadata cannot be
    /// written or read back.
    pub fn ensure(&self, name: &EnvironmentName) -> HearthResult<Environment> {
        self.ensure_inner(name).map(|(env, _)| env)
    }

    /// Create a new environment.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::EnvironmentExists`] if it already exists, or
    /// [`HearthError::Storage`] on I/O failure.
    pub fn create(&self, name: &EnvironmentName) -> HearthResult<Environment> {
        match self.ensure_inner(name)? {
            (env, true) => Ok(env),
            (_, false) => Err(HearthError::EnvironmentExists(name.to_string())),
        }
    }

    fn ensure_inner(&self, name: &EnvironmentName) -> HearthResult<(Environment, bool)> {
        let root = self.root_for(name);
        std::fs::create_dir_all(&root).map_err(|e| HearthError::storage(&root, e))?;

        let metadata_path = root.join(METADATA_FILE_NAME);
        let metadata = EnvironmentMetadata {
            name: name.clone(),
            created_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| HearthError::storage(&metadata_path, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&root)
            .map_err(|e| HearthError::storage(&root, e))?;
        tmp.write_all(&body)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| HearthError::storage(&metadata_path, e))?;

        match tmp.persist_noclobber(&metadata_path) {
            Ok(_) => {
                info!(environment = %name, root = %root.display(), "Created environment");
                Ok((
                    Environment {
                        name: name.clone(),
                        storage_root: root,
                        created_at: metadata.created_at,
                    },
                    true,
                ))
            },
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = read_metadata(&root, name)?
                    .ok_or_else(|| HearthError::storage(&metadata_path, "metadata vanished"))?;
                Ok((existing, false))
            },
            Err(e) => Err(HearthError::storage(&metadata_path, e.error)),
        }
    }

    /// Look up an environment without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if the metadata exists but is unreadable.
    pub fn get(&self, name: &EnvironmentName) -> HearthResult<Option<Environment>> {
        read_metadata(&self.root_for(name), name)
    }

    /// Every known environment, ordered by name. Always reads storage.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if the environments directory cannot
    /// be read.
    pub fn list(&self) -> HearthResult<Vec<Environment>> {
        let dir = self.home.environments_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HearthError::storage(&dir, e)),
        };

        let mut environments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HearthError::storage(&dir, e))?;
            let file_name = entry.file_name();
            let Some(raw) = file_name.to_str() else {
                continue;
            };
            // Trash directories and stray files are not environments.
            let Ok(name) = EnvironmentName::new(raw) else {
                continue;
            };
            match read_metadata(&entry.path(), &name) {
                Ok(Some(env)) => environments.push(env),
                Ok(None) => debug!(environment = %name, "Skipping directory without metadata"),
                Err(e) => warn!(environment = %name, error = %e, "Skipping unreadable environment"),
            }
        }

        environments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(environments)
    }

    /// Remove an environment's storage.
    ///
    /// The root is first renamed to a hidden trash directory, so the
    /// environment disappears from [`list`](Self::list) atomically even if
    /// the recursive delete is slow or partially fails.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::EnvironmentNotFound`] if there is no storage,
    /// or [`HearthError::Storage`] if it cannot be moved away.
    pub fn remove_storage(&self, name: &EnvironmentName) -> HearthResult<()> {
        let root = self.root_for(name);
        let trash = self
            .home
            .environments_dir()
            .join(format!(".trash-{name}-{}", uuid::Uuid::new_v4().simple()));

        match std::fs::rename(&root, &trash) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HearthError::EnvironmentNotFound(name.to_string()));
            },
            Err(e) => return Err(HearthError::storage(&root, e)),
        }

        if let Err(e) = std::fs::remove_dir_all(&trash) {
            warn!(
                environment = %name,
                path = %trash.display(),
                error = %e,
                "Failed to remove environment trash directory"
            );
        }
        info!(environment = %name, "Deleted environment storage");
        Ok(())
    }
}

fn read_metadata(root: &Path, name: &EnvironmentName) -> HearthResult<Option<Environment>> {
    let path = root.join(METADATA_FILE_NAME);
    let body = match std::fs::read(&path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HearthError::storage(&path, e)),
    };

    let metadata: EnvironmentMetadata = serde_json::from_slice(&body)
        .map_err(|e| HearthError::storage(&path, format!("invalid environment metadata: {e}")))?;

    if &metadata.name != name {
        warn!(
            environment = %name,
            recorded = %metadata.name,
            "Environment metadata names a different environment; using directory name"
        );
    }

    Ok(Some(Environment {
        name: name.clone(),
        storage_root: root.to_path_buf(),
        created_at: metadata.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn store() -> (tempfile::TempDir, EnvironmentStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnvironmentStore::new(HearthHome::from_path(tmp.path()));
        (tmp, store)
    }

    fn env(name: &str) -> EnvironmentName {
        EnvironmentName::new(name).unwrap()
    }

    #[test]
    fn ensure_is_idempotent() {
        let (_tmp, store) = store();
        let first = store.ensure(&env("research")).unwrap();
        let second = store.ensure(&env("research")).unwrap();
        assert_eq!(first, second);
        assert!(first.storage_root.join(METADATA_FILE_NAME).is_file());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_ensure_agrees_on_created_at() {
        let (_tmp, store) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.ensure(&env("shared")).unwrap())
            })
            .collect();
        let results: Vec<Environment> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn create_rejects_existing() {
        let (_tmp, store) = store();
        store.create(&env("lab")).unwrap();
        assert!(matches!(
            store.create(&env("lab")),
            Err(HearthError::EnvironmentExists(ref n)) if n == "lab"
        ));
    }

    #[test]
    fn list_is_ordered_and_skips_strays() {
        let (tmp, store) = store();
        for name in ["zeta", "alpha", "mid"] {
            store.ensure(&env(name)).unwrap();
        }
        std::fs::create_dir_all(tmp.path().join("environments/no-metadata")).unwrap();
        std::fs::create_dir_all(tmp.path().join("environments/.trash-x")).unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn list_without_home_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnvironmentStore::new(HearthHome::from_path(tmp.path().join("absent")));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn get_does_not_create() {
        let (_tmp, store) = store();
        assert!(store.get(&env("ghost")).unwrap().is_none());
        assert!(!store.root_for(&env("ghost")).exists());
    }

    #[test]
    fn remove_storage_deletes_root() {
        let (_tmp, store) = store();
        let created = store.ensure(&env("gone")).unwrap();
        store.remove_storage(&env("gone")).unwrap();
        assert!(!created.storage_root.exists());
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.remove_storage(&env("gone")),
            Err(HearthError::EnvironmentNotFound(_))
        ));
    }

    #[test]
    fn corrupt_metadata_is_storage_error() {
        let (_tmp, store) = store();
        let created = store.ensure(&env("bad")).unwrap();
        std::fs::write(created.storage_root.join(METADATA_FILE_NAME), "{").unwrap();
        assert!(matches!(
            store.get(&env("bad")),
            Err(HearthError::Storage { .. })
        ));
    }
}
