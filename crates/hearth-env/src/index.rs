//! Durable package index for one environment.
//!
//! The index (`<env root>/packages.lock`) records exactly which packages are
//! installed, at which version, and where their artifacts live. It is the
//! commit point of every install and remove: a package exists for readers
//! once its record is in this file, and not before.
//!
//! # Format
//!
//! TOML with `schema_version = 1` and a flat `[[package]]` array of
//! [`IndexedPackage`] entries. Writes go to a temp file in the same
//! directory, are fsynced, then renamed over the old file. A `.lk` sibling
//! carries an advisory lock so two processes sharing a home do not
//! interleave read-modify-write cycles.

use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use hearth_core::{
    CatalogEntry, EnvironmentName, HearthError, HearthResult, Package, PackageKind, PackageName,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current index schema version.
const SCHEMA_VERSION: u32 = 1;

/// Index file name inside an environment root.
pub const INDEX_FILE_NAME: &str = "packages.lock";

/// Directory (relative to the environment root) holding installed artifacts.
pub const PACKAGES_DIR: &str = "packages";

/// The installed-package index of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
    /// Schema version for forward compatibility.
    schema_version: u32,
    /// Installed package records.
    #[serde(default, rename = "package")]
    entries: Vec<IndexedPackage>,
}

/// One installed package as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedPackage {
    /// Package name, unique within the index.
    pub name: PackageName,
    /// Installed version.
    pub version: String,
    /// Presentation tag.
    pub kind: PackageKind,
    /// Locator the package was installed from.
    pub source_ref: String,
    /// When the install committed.
    pub installed_at: DateTime<Utc>,
    /// Artifact directory relative to the environment root.
    pub artifact_dir: String,
}

impl IndexedPackage {
    /// Record for a freshly installed `entry` whose artifacts are at `artifact_dir`.
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry, artifact_dir: impl Into<String>) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            kind: entry.kind,
            source_ref: entry.source_ref.clone(),
            installed_at: Utc::now(),
            artifact_dir: artifact_dir.into(),
        }
    }

    /// The public view of this record.
    #[must_use]
    pub fn to_package(&self, environment: &EnvironmentName) -> Package {
        Package {
            name: self.name.clone(),
            version: self.version.clone(),
            kind: self.kind,
            environment: environment.clone(),
            source_ref: self.source_ref.clone(),
            installed_at: self.installed_at,
        }
    }

    /// Absolute artifact directory under `root`.
    #[must_use]
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        root.join(&self.artifact_dir)
    }
}

/// Relative artifact path for an install of `name` with id `install_id`.
#[must_use]
pub fn artifact_dir_for(name: &PackageName, install_id: &str) -> String {
    format!("{PACKAGES_DIR}/{name}/{install_id}")
}

/// An inconsistency between the index and the files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexViolation {
    /// The record's artifact directory does not exist.
    MissingArtifacts {
        /// The affected package.
        name: PackageName,
        /// The directory that was expected.
        artifact_dir: String,
    },
}

impl fmt::Display for IndexViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArtifacts { name, artifact_dir } => write!(
                f,
                "package {name} is in the index but {artifact_dir} is missing from disk"
            ),
        }
    }
}

impl PackageIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }

    /// Load the index, returning an empty one if the file is missing or blank.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::IndexCorrupt`] if the content cannot be parsed
    /// or is inconsistent, or [`HearthError::Storage`] if it cannot be read.
    pub fn load_or_default(path: &Path) -> HearthResult<Self> {
        let _lock_guard = acquire_lock_file(path, LockMode::Shared)?;
        Self::read(path)
    }

    fn read(path: &Path) -> HearthResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_content(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(HearthError::storage(path, format!("failed to read index: {e}"))),
        }
    }

    fn parse_content(path: &Path, content: &str) -> HearthResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let corrupt = |message: String| HearthError::IndexCorrupt {
            path: path.to_path_buf(),
            message,
        };

        let index: Self =
            toml::from_str(content).map_err(|e| corrupt(format!("failed to parse index: {e}")))?;

        if index.schema_version != SCHEMA_VERSION {
            warn!(
                path = %path.display(),
                found = index.schema_version,
                expected = SCHEMA_VERSION,
                "Index schema version mismatch, attempting best-effort load"
            );
        }

        let mut seen = HashSet::new();
        for entry in &index.entries {
            if !seen.insert(&entry.name) {
                return Err(corrupt(format!("duplicate record for package {}", entry.name)));
            }
            if !is_contained_artifact_dir(&entry.artifact_dir) {
                return Err(corrupt(format!(
                    "package {} has an invalid artifact_dir '{}'",
                    entry.name, entry.artifact_dir
                )));
            }
        }

        debug!(
            path = %path.display(),
            entries = index.entries.len(),
            "Loaded package index"
        );
        Ok(index)
    }

    /// Load, mutate, and save the index under one exclusive lock.
    ///
    /// The closure sees the on-disk state, not a cached copy. Nothing is
    /// written if it fails. Returns the saved index with the closure's value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or written, or
    /// if the closure returns an error.
    pub fn update<F, R>(path: &Path, f: F) -> HearthResult<(Self, R)>
    where
        F: FnOnce(&mut Self) -> HearthResult<R>,
    {
        let _lock_guard = acquire_lock_file(path, LockMode::Exclusive)?;

        let mut index = Self::read(path)?;
        let value = f(&mut index)?;
        index.save_inner(path)?;
        Ok((index, value))
    }

    /// Caller must hold the exclusive lock.
    fn save_inner(&self, path: &Path) -> HearthResult<()> {
        let header = "# Generated by hearth. Do not edit manually.\n\n";
        let body = toml::to_string_pretty(self)
            .map_err(|e| HearthError::storage(path, format!("failed to serialize index: {e}")))?;
        let content = format!("{header}{body}");

        let parent = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| HearthError::storage(path, format!("failed to create temp index: {e}")))?;

        tmp.write_all(content.as_bytes())
            .map_err(|e| HearthError::storage(path, format!("failed to write temp index: {e}")))?;

        tmp.as_file()
            .sync_all()
            .map_err(|e| HearthError::storage(path, format!("failed to sync temp index: {e}")))?;

        tmp.persist(path).map_err(|e| {
            HearthError::storage(path, format!("failed to atomically replace index: {e}"))
        })?;

        debug!(path = %path.display(), entries = self.entries.len(), "Saved package index");
        Ok(())
    }

    /// Insert or replace the record for `entry.name`, returning the old one.
    pub fn upsert(&mut self, entry: IndexedPackage) -> Option<IndexedPackage> {
        let previous = self.remove(&entry.name);
        self.entries.push(entry);
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        previous
    }

    /// Remove the record for `name`, returning it.
    pub fn remove(&mut self, name: &PackageName) -> Option<IndexedPackage> {
        let pos = self.entries.iter().position(|e| &e.name == name)?;
        Some(self.entries.remove(pos))
    }

    /// Look up a record by name.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<&IndexedPackage> {
        self.entries.iter().find(|e| &e.name == name)
    }

    /// All records, ordered by name.
    #[must_use]
    pub fn entries(&self) -> &[IndexedPackage] {
        &self.entries
    }

    /// Whether the index has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check every record's artifact directory against `root`.
    #[must_use]
    pub fn verify(&self, root: &Path) -> Vec<IndexViolation> {
        self.entries
            .iter()
            .filter(|e| !e.artifact_path(root).is_dir())
            .map(|e| IndexViolation::MissingArtifacts {
                name: e.name.clone(),
                artifact_dir: e.artifact_dir.clone(),
            })
            .collect()
    }
}

impl Default for PackageIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// An artifact dir must stay under `packages/` with no `..` or absolute parts.
fn is_contained_artifact_dir(dir: &str) -> bool {
    let path = Path::new(dir);
    let mut components = path.components();
    matches!(components.next(), Some(Component::Normal(first)) if first == PACKAGES_DIR)
        && components.clone().next().is_some()
        && components.all(|c| matches!(c, Component::Normal(_)))
}

/// Whether to acquire a shared (read) or exclusive (write) lock.
#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Path of the advisory lock file for `index_path` (`packages.lock.lk`).
fn lock_path(index_path: &Path) -> PathBuf {
    let mut name = index_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lk");
    index_path.with_file_name(name)
}

/// Acquire an advisory lock on the `.lk` sibling of `index_path`.
///
/// Shared mode never creates files: with no lock file there is no writer to
/// coordinate with. Exclusive mode creates the lock file as needed but never
/// its directory, so a deleted environment root stays deleted.
fn acquire_lock_file(index_path: &Path, mode: LockMode) -> HearthResult<Option<std::fs::File>> {
    let lock_path = lock_path(index_path);
    let lock_err = |what: &str, e: std::io::Error| {
        HearthError::storage(index_path, format!("failed to {what}: {e}"))
    };

    match mode {
        LockMode::Shared => match std::fs::OpenOptions::new().read(true).open(&lock_path) {
            Ok(lock_file) => {
                lock_file
                    .lock_shared()
                    .map_err(|e| lock_err("acquire shared index lock", e))?;
                Ok(Some(lock_file))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(lock_err("open index lock file", e)),
        },
        LockMode::Exclusive => {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .read(true)
                .open(&lock_path)
                .map_err(|e| lock_err("open index lock file", e))?;

            lock_file
                .lock_exclusive()
                .map_err(|e| lock_err("acquire exclusive index lock", e))?;

            Ok(Some(lock_file))
        },
    }
}
