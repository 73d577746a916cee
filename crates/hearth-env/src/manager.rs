//! Per-environment package manager.
//!
//! A [`PackageManager`] owns the installed-package state of exactly one
//! environment. Readers see an in-memory snapshot of the last committed
//! index; writers go through the durable index and then swap the snapshot.
//!
//! Locking:
//! - one async mutex per package name serializes install/remove of that name
//! - one short commit lock serializes the index read-modify-write
//!
//! Neither is held by readers, and the commit lock is never held across
//! catalog resolution or artifact production. A commit runs to completion on
//! the blocking pool once started: the durable write and the snapshot swap
//! happen together even if the calling future is dropped.
//!
//! Deleting the environment retires its manager: in-flight installs are
//! cancelled and drained, every further mutation is refused, and no mutation
//! recreates a missing root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use hearth_catalog::CatalogClient;
use hearth_core::{
    CancellationToken, Environment, EnvironmentName, HearthError, HearthResult, Package,
    PackageName, cancellable, with_deadline,
};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::index::{
    INDEX_FILE_NAME, IndexViolation, IndexedPackage, PACKAGES_DIR, PackageIndex, artifact_dir_for,
};
use crate::installer::Installer;

/// Directory (relative to the environment root) for in-flight installs.
pub const STAGING_DIR: &str = ".staging";

/// Knobs shared by every manager a registry builds.
#[derive(Debug, Clone, Default)]
pub struct ManagerSettings {
    /// Deadline for one install. `None` disables it.
    pub install_timeout: Option<Duration>,
}

/// Installed-package state and mutations for one environment.
#[derive(Debug)]
pub struct PackageManager {
    environment: Environment,
    index_path: PathBuf,
    catalog: Arc<CatalogClient>,
    installer: Arc<dyn Installer>,
    settings: ManagerSettings,
    snapshot: Arc<RwLock<Arc<PackageIndex>>>,
    name_locks: DashMap<PackageName, Arc<Mutex<()>>>,
    commit_lock: Arc<Mutex<()>>,
    retired: Arc<AtomicBool>,
    shutdown: CancellationToken,
    in_flight: StdMutex<HashSet<String>>,
    drained: Notify,
}

impl PackageManager {
    /// Load the manager for `environment`, reading its durable index on the
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::IndexCorrupt`] if the index cannot be parsed,
    /// or [`HearthError::Storage`] if it cannot be read.
    pub async fn load(
        environment: Environment,
        catalog: Arc<CatalogClient>,
        installer: Arc<dyn Installer>,
        settings: ManagerSettings,
    ) -> HearthResult<Self> {
        let index_path = environment.storage_root.join(INDEX_FILE_NAME);
        let path = index_path.clone();
        let index = tokio::task::spawn_blocking(move || PackageIndex::load_or_default(&path))
            .await
            .map_err(|e| {
                HearthError::storage(&index_path, format!("index load task failed: {e}"))
            })??;
        debug!(
            environment = %environment.name,
            packages = index.len(),
            "Loaded package manager"
        );

        Ok(Self {
            environment,
            index_path,
            catalog,
            installer,
            settings,
            snapshot: Arc::new(RwLock::new(Arc::new(index))),
            name_locks: DashMap::new(),
            commit_lock: Arc::new(Mutex::new(())),
            retired: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            in_flight: StdMutex::new(HashSet::new()),
            drained: Notify::new(),
        })
    }

    /// The environment this manager serves.
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Shorthand for the environment name.
    #[must_use]
    pub fn environment_name(&self) -> &EnvironmentName {
        &self.environment.name
    }

    fn root(&self) -> &Path {
        &self.environment.storage_root
    }

    fn snapshot(&self) -> Arc<PackageIndex> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Refuse all further mutations and cancel installs in flight.
    ///
    /// Returns once every in-flight install has exited and any commit already
    /// past its retired check has finished, so nothing writes to the
    /// environment root afterwards.
    pub(crate) async fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
        loop {
            let drained = self.drained.notified();
            if self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
            {
                break;
            }
            drained.await;
        }
        let _commit = self.commit_lock.lock().await;
        debug!(environment = %self.environment_name(), "Retired package manager");
    }

    fn ensure_live(&self) -> HearthResult<()> {
        if self.retired.load(Ordering::SeqCst) {
            return Err(HearthError::EnvironmentNotFound(self.environment_name().to_string()));
        }
        Ok(())
    }

    fn name_lock(&self, name: &PackageName) -> Arc<Mutex<()>> {
        self.name_locks
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Installed packages as of the last commit, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<Package> {
        self.snapshot()
            .entries()
            .iter()
            .map(|e| e.to_package(self.environment_name()))
            .collect()
    }

    /// The installed record for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<Package> {
        self.snapshot()
            .get(name)
            .map(|e| e.to_package(self.environment_name()))
    }

    /// Resolve, install, and commit `name`.
    ///
    /// Replaces any installed version. Same-name installs and removes in
    /// this environment are serialized; different names run concurrently.
    /// On any failure the index is unchanged.
    ///
    /// # Errors
    ///
    /// Resolution errors (`PackageNotFound`, `VersionNotFound`,
    /// `CatalogUnavailable`), installer errors (`InstallFailed`),
    /// `Cancelled`, `DeadlineExceeded`, commit errors (`Storage`,
    /// `IndexCorrupt`), or `EnvironmentNotFound` once the environment is
    /// deleted.
    pub async fn install(
        &self,
        name: &PackageName,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> HearthResult<Package> {
        let lock = self.name_lock(name);
        let _guard = lock.lock().await;
        self.ensure_live()?;

        let entry = self.catalog.resolve(name, version, cancel).await?;
        debug!(
            environment = %self.environment_name(),
            package = %name,
            version = %entry.version,
            "Resolved package"
        );

        let install_id = uuid::Uuid::new_v4().simple().to_string();
        let _in_flight = InFlight::register(&self.in_flight, &self.drained, &install_id);
        // Registered first: a concurrent retire either waits for us or we see it.
        self.ensure_live()?;
        let staging = create_within_root(
            self.root(),
            &Path::new(STAGING_DIR).join(&install_id),
            self.environment_name(),
        )
        .await?;

        let produced = with_deadline(
            "install",
            self.settings.install_timeout,
            cancellable(
                "install",
                &self.shutdown,
                cancellable("install", cancel, self.installer.install(&entry, &staging, cancel)),
            ),
        )
        .await
        .and_then(|()| {
            if cancel.is_cancelled() {
                Err(HearthError::Cancelled("install".to_string()))
            } else {
                Ok(())
            }
        });

        if let Err(e) = produced {
            let e = self.ensure_live().err().unwrap_or(e);
            remove_dir_best_effort(&staging).await;
            warn!(
                environment = %self.environment_name(),
                package = %name,
                error = %e,
                "Install failed before commit"
            );
            return Err(e);
        }

        let artifact_dir = artifact_dir_for(name, &install_id);
        let artifact_path = self.root().join(&artifact_dir);
        if let Err(e) = self.move_into_place(&staging, Path::new(&artifact_dir)).await {
            remove_dir_best_effort(&staging).await;
            return Err(e);
        }

        let record = IndexedPackage::from_entry(&entry, artifact_dir);
        let package = record.to_package(self.environment_name());

        let previous = match self.commit(move |idx| Ok(idx.upsert(record))).await {
            Ok(previous) => previous,
            Err(e) => {
                remove_dir_best_effort(&artifact_path).await;
                warn!(
                    environment = %self.environment_name(),
                    package = %name,
                    error = %e,
                    "Install commit failed"
                );
                return Err(e);
            },
        };

        if let Some(old) = previous {
            debug!(
                environment = %self.environment_name(),
                package = %name,
                replaced = %old.version,
                "Removing superseded artifacts"
            );
            remove_dir_best_effort(&old.artifact_path(self.root())).await;
        }

        info!(
            environment = %self.environment_name(),
            package = %name,
            version = %package.version,
            "Installed package"
        );
        Ok(package)
    }

    /// Remove `name` from this environment.
    ///
    /// The index commit is the point of no return; artifacts are deleted
    /// afterwards on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::PackageNotInstalled`] if there is no record,
    /// [`HearthError::EnvironmentNotFound`] once the environment is deleted,
    /// or a commit error.
    pub async fn remove(&self, name: &PackageName) -> HearthResult<Package> {
        let lock = self.name_lock(name);
        let _guard = lock.lock().await;

        let environment = self.environment_name().to_string();
        let target = name.clone();
        let removed = self
            .commit(move |idx| {
                idx.remove(&target)
                    .ok_or_else(|| HearthError::PackageNotInstalled {
                        name: target.to_string(),
                        environment,
                    })
            })
            .await?;

        remove_dir_best_effort(&removed.artifact_path(self.root())).await;
        prune_empty_parent(&removed.artifact_path(self.root())).await;

        info!(
            environment = %self.environment_name(),
            package = %name,
            version = %removed.version,
            "Removed package"
        );
        Ok(removed.to_package(self.environment_name()))
    }

    /// Apply `f` to the durable index and publish the result.
    ///
    /// The blocking task owns the commit lock, the write and the snapshot
    /// swap, so dropping this future never leaves them out of step.
    async fn commit<F, R>(&self, f: F) -> HearthResult<R>
    where
        F: FnOnce(&mut PackageIndex) -> HearthResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let commit = Arc::clone(&self.commit_lock).lock_owned().await;
        let path = self.index_path.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let retired = Arc::clone(&self.retired);
        let environment = self.environment_name().to_string();

        tokio::task::spawn_blocking(move || {
            let _commit = commit;
            if retired.load(Ordering::SeqCst) {
                return Err(HearthError::EnvironmentNotFound(environment));
            }
            let (index, value) = PackageIndex::update(&path, f)?;
            *snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
            Ok(value)
        })
        .await
        .map_err(|e| HearthError::storage(&self.index_path, format!("commit task failed: {e}")))?
    }

    /// Rename a finished staging directory to `root/<artifact_dir>`.
    async fn move_into_place(&self, staging: &Path, artifact_dir: &Path) -> HearthResult<()> {
        if let Some(parent) = artifact_dir.parent() {
            create_within_root(self.root(), parent, self.environment_name()).await?;
        }
        let artifact_path = self.root().join(artifact_dir);
        tokio::fs::rename(staging, &artifact_path)
            .await
            .map_err(|e| HearthError::storage(&artifact_path, e))
    }

    /// Records whose artifact directories are missing on disk.
    #[must_use]
    pub fn verify(&self) -> Vec<IndexViolation> {
        self.snapshot().verify(self.root())
    }

    /// Delete artifact and staging directories no record references.
    ///
    /// Directories belonging to installs still in flight are kept. Returns
    /// how many directories were removed.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if the environment root cannot be
    /// read, or [`HearthError::EnvironmentNotFound`] once it is deleted.
    pub async fn prune_orphans(&self) -> HearthResult<usize> {
        let _commit = self.commit_lock.lock().await;
        self.ensure_live()?;

        let snapshot = self.snapshot();
        let referenced: HashSet<PathBuf> = snapshot
            .entries()
            .iter()
            .map(|e| e.artifact_path(self.root()))
            .collect();
        let in_flight: HashSet<String> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut candidates = list_subdirs(&self.root().join(STAGING_DIR)).await?;
        for package_dir in list_subdirs(&self.root().join(PACKAGES_DIR)).await? {
            candidates.extend(list_subdirs(&package_dir).await?);
        }

        let mut removed: usize = 0;
        for dir in candidates {
            let id = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if referenced.contains(&dir) || in_flight.contains(&id) {
                continue;
            }
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    debug!(path = %dir.display(), "Pruned orphaned directory");
                    prune_empty_parent(&dir).await;
                    removed = removed.saturating_add(1);
                },
                Err(e) => warn!(path = %dir.display(), error = %e, "Failed to prune directory"),
            }
        }

        if removed > 0 {
            info!(
                environment = %self.environment_name(),
                removed,
                "Pruned orphaned artifacts"
            );
        }
        Ok(removed)
    }
}

/// Registration of an install id for the duration of one install.
struct InFlight<'a> {
    set: &'a StdMutex<HashSet<String>>,
    drained: &'a Notify,
    id: String,
}

impl<'a> InFlight<'a> {
    fn register(set: &'a StdMutex<HashSet<String>>, drained: &'a Notify, id: &str) -> Self {
        set.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        Self {
            set,
            drained,
            id: id.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.id);
        if set.is_empty() {
            self.drained.notify_waiters();
        }
    }
}

/// Create `root/<relative>` one level at a time without ever creating `root`.
///
/// A missing root means the environment was deleted underneath us.
async fn create_within_root(
    root: &Path,
    relative: &Path,
    environment: &EnvironmentName,
) -> HearthResult<PathBuf> {
    let gone = || HearthError::EnvironmentNotFound(environment.to_string());
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {},
        Ok(_) => return Err(gone()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(gone()),
        Err(e) => return Err(HearthError::storage(root, e)),
    }

    let mut path = root.to_path_buf();
    for component in relative.components() {
        path.push(component);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(gone()),
            Err(e) => return Err(HearthError::storage(&path, e)),
        }
    }
    Ok(path)
}

async fn remove_dir_best_effort(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {},
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove directory"),
    }
}

/// Remove `packages/<name>/` once its last install directory is gone.
async fn prune_empty_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        // Fails harmlessly when the directory is not empty.
        let _ = tokio::fs::remove_dir(parent).await;
    }
}

async fn list_subdirs(dir: &Path) -> HearthResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(HearthError::storage(dir, e)),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HearthError::storage(dir, e))?
    {
        if entry
            .file_type()
            .await
            .map_err(|e| HearthError::storage(entry.path(), e))?
            .is_dir()
        {
            out.push(entry.path());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use hearth_catalog::CatalogSource;
    use hearth_core::{CatalogEntry, PackageKind};

    use super::*;

    #[derive(Debug)]
    struct FixedSource(Vec<CatalogEntry>);

    #[async_trait]
    impl CatalogSource for FixedSource {
        fn location(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> HearthResult<Vec<CatalogEntry>> {
            Ok(self.0.clone())
        }
    }

    /// Writes a marker file; fails or stalls on demand.
    #[derive(Debug, Default)]
    struct MarkerInstaller {
        fail: bool,
        stall: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Installer for MarkerInstaller {
        async fn install(
            &self,
            entry: &CatalogEntry,
            staging: &Path,
            _cancel: &CancellationToken,
        ) -> HearthResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(staging.join("VERSION"), &entry.version).unwrap();
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(HearthError::InstallFailed {
                    package: entry.name.to_string(),
                    reason: "injected".into(),
                });
            }
            Ok(())
        }
    }

    fn entry(name: &str, version: &str) -> CatalogEntry {
        CatalogEntry::new(name, version, PackageKind::Ability, format!("git://x/{name}")).unwrap()
    }

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).unwrap()
    }

    async fn manager_with(
        root: &Path,
        installer: MarkerInstaller,
        settings: ManagerSettings,
    ) -> PackageManager {
        let environment = Environment {
            name: EnvironmentName::new("research").unwrap(),
            storage_root: root.to_path_buf(),
            created_at: chrono::Utc::now(),
        };
        let catalog = CatalogClient::new(Arc::new(FixedSource(vec![
            entry("french-skill", "1.2.0"),
            entry("french-skill", "1.3.0"),
            entry("clock", "0.1.0"),
        ])));
        PackageManager::load(environment, Arc::new(catalog), Arc::new(installer), settings)
            .await
            .unwrap()
    }

    async fn manager(root: &Path) -> PackageManager {
        manager_with(root, MarkerInstaller::default(), ManagerSettings::default()).await
    }

    #[tokio::test]
    async fn install_commits_and_lists() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        let token = CancellationToken::new();

        let pkg_rec = mgr.install(&pkg("french-skill"), None, &token).await.unwrap();
        assert_eq!(pkg_rec.version, "1.3.0");
        assert_eq!(pkg_rec.environment.as_str(), "research");

        let listed = mgr.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name.as_str(), "french-skill");
        assert!(mgr.verify().is_empty());

        // A fresh manager sees the durable state.
        let reloaded = manager(tmp.path()).await;
        assert_eq!(reloaded.list(), listed);
    }

    #[tokio::test]
    async fn reinstall_replaces_and_cleans_superseded_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        let token = CancellationToken::new();

        mgr.install(&pkg("french-skill"), Some("1.2.0"), &token)
            .await
            .unwrap();
        mgr.install(&pkg("french-skill"), Some("1.3.0"), &token)
            .await
            .unwrap();

        let listed = mgr.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, "1.3.0");

        let installs: Vec<_> = std::fs::read_dir(tmp.path().join("packages/french-skill"))
            .unwrap()
            .collect();
        assert_eq!(installs.len(), 1);
    }

    #[tokio::test]
    async fn failed_install_leaves_no_trace() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = MarkerInstaller {
            fail: true,
            ..MarkerInstaller::default()
        };
        let mgr = manager_with(tmp.path(), installer, ManagerSettings::default()).await;

        let err = mgr
            .install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::InstallFailed { .. }));
        assert!(mgr.list().is_empty());
        assert!(!tmp.path().join(INDEX_FILE_NAME).exists());
        let staging: Vec<_> = std::fs::read_dir(tmp.path().join(STAGING_DIR))
            .unwrap()
            .collect();
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn unknown_package_and_version() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        let token = CancellationToken::new();

        assert!(matches!(
            mgr.install(&pkg("nope"), None, &token).await,
            Err(HearthError::PackageNotFound(_))
        ));
        assert!(matches!(
            mgr.install(&pkg("clock"), Some("9.9.9"), &token).await,
            Err(HearthError::VersionNotFound { .. })
        ));
        assert!(mgr.list().is_empty());
    }

    #[tokio::test]
    async fn deadline_aborts_install() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = MarkerInstaller {
            stall: true,
            ..MarkerInstaller::default()
        };
        let settings = ManagerSettings {
            install_timeout: Some(Duration::from_millis(20)),
        };
        let mgr = manager_with(tmp.path(), installer, settings).await;

        let err = mgr
            .install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::DeadlineExceeded { .. }));
        assert!(mgr.list().is_empty());
    }

    #[tokio::test]
    async fn cancelled_install_leaves_index_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = MarkerInstaller {
            stall: true,
            ..MarkerInstaller::default()
        };
        let mgr = manager_with(tmp.path(), installer, ManagerSettings::default()).await;
        let token = hearth_core::cancel_after(Duration::from_millis(20));

        let err = mgr.install(&pkg("clock"), None, &token).await.unwrap_err();
        assert!(matches!(err, HearthError::Cancelled(_)));
        assert!(mgr.list().is_empty());
    }

    #[tokio::test]
    async fn remove_commits_then_deletes_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap();

        let removed = mgr.remove(&pkg("clock")).await.unwrap();
        assert_eq!(removed.version, "0.1.0");
        assert!(mgr.list().is_empty());
        assert!(mgr.get(&pkg("clock")).is_none());
        assert!(!tmp.path().join("packages/clock").exists());
    }

    #[tokio::test]
    async fn remove_unknown_is_not_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        let err = mgr.remove(&pkg("clock")).await.unwrap_err();
        assert!(matches!(
            err,
            HearthError::PackageNotInstalled { ref name, ref environment }
                if name == "clock" && environment == "research"
        ));
    }

    #[tokio::test]
    async fn verify_flags_missing_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap();
        std::fs::remove_dir_all(tmp.path().join("packages/clock")).unwrap();

        let violations = mgr.verify();
        assert_eq!(violations.len(), 1);
    }

    #[tokio::test]
    async fn prune_removes_only_unreferenced_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap();

        std::fs::create_dir_all(tmp.path().join(".staging/leftover")).unwrap();
        std::fs::create_dir_all(tmp.path().join("packages/clock/stale-id")).unwrap();
        std::fs::create_dir_all(tmp.path().join("packages/ghost/old-id")).unwrap();

        let removed = mgr.prune_orphans().await.unwrap();
        assert_eq!(removed, 3);
        assert!(mgr.verify().is_empty());
        assert!(!tmp.path().join("packages/ghost").exists());
        assert_eq!(mgr.list().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_index_fails_load() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(INDEX_FILE_NAME), "garbage = [").unwrap();
        let environment = Environment {
            name: EnvironmentName::new("broken").unwrap(),
            storage_root: tmp.path().to_path_buf(),
            created_at: chrono::Utc::now(),
        };
        let catalog = Arc::new(CatalogClient::new(Arc::new(FixedSource(Vec::new()))));
        let err = PackageManager::load(
            environment,
            catalog,
            Arc::new(MarkerInstaller::default()),
            ManagerSettings::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_index_corrupt());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_name_installs_serialize() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = Arc::new(manager(tmp.path()).await);

        let a = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                mgr.install(&pkg("french-skill"), Some("1.2.0"), &CancellationToken::new())
                    .await
            })
        };
        let b = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                mgr.install(&pkg("french-skill"), Some("1.3.0"), &CancellationToken::new())
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let listed = mgr.list();
        assert_eq!(listed.len(), 1);
        assert!(["1.2.0", "1.3.0"].contains(&listed[0].version.as_str()));
        assert!(mgr.verify().is_empty());
    }

    /// Take the exclusive index lock the way another process would.
    fn hold_index_lock(root: &Path) -> std::fs::File {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(root.join(format!("{INDEX_FILE_NAME}.lk")))
            .unwrap();
        fs2::FileExt::lock_exclusive(&lock_file).unwrap();
        lock_file
    }

    // Single-threaded runtime: a load that blocked its worker would starve
    // the sleeping test body and never finish.
    #[tokio::test(flavor = "current_thread")]
    async fn load_waits_for_a_writer_off_the_runtime() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_file = hold_index_lock(tmp.path());

        let root = tmp.path().to_path_buf();
        let load = tokio::spawn(async move { manager(&root).await.list().len() });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!load.is_finished());

        drop(lock_file);
        let listed = tokio::time::timeout(Duration::from_secs(5), load)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(listed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_install_still_publishes_its_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = Arc::new(manager(tmp.path()).await);
        let index_path = tmp.path().join(INDEX_FILE_NAME);

        // Hold the index lock so the commit parks inside its blocking task.
        let lock_file = hold_index_lock(tmp.path());

        let task = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                mgr.install(&pkg("clock"), None, &CancellationToken::new())
                    .await
            })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tmp.path().join("packages/clock").exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        drop(lock_file);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let on_disk = PackageIndex::load_or_default(&index_path).unwrap().len();
                if on_disk == 1 && mgr.list().len() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("durable index and list() diverged");
        assert_eq!(mgr.get(&pkg("clock")).unwrap().version, "0.1.0");
        assert!(mgr.verify().is_empty());
    }

    #[tokio::test]
    async fn retired_manager_refuses_mutations() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        let token = CancellationToken::new();
        mgr.install(&pkg("clock"), None, &token).await.unwrap();

        mgr.retire().await;

        assert!(matches!(
            mgr.install(&pkg("french-skill"), None, &token).await,
            Err(HearthError::EnvironmentNotFound(ref env)) if env == "research"
        ));
        assert!(matches!(
            mgr.remove(&pkg("clock")).await,
            Err(HearthError::EnvironmentNotFound(_))
        ));
        assert!(matches!(
            mgr.prune_orphans().await,
            Err(HearthError::EnvironmentNotFound(_))
        ));
        let durable = PackageIndex::load_or_default(&tmp.path().join(INDEX_FILE_NAME)).unwrap();
        assert_eq!(durable.len(), 1);
    }

    #[tokio::test]
    async fn install_never_recreates_a_deleted_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("research");
        std::fs::create_dir(&root).unwrap();
        let mgr = manager(&root).await;
        std::fs::remove_dir_all(&root).unwrap();

        let err = mgr
            .install(&pkg("clock"), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::EnvironmentNotFound(_)));
        assert!(!root.exists());
        assert!(mgr.list().is_empty());
    }
}
