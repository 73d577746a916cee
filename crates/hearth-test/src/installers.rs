//! Installer doubles.
//!
//! Every double writes real files into the staging directory so the
//! manager's move-and-commit path runs exactly as it would for a real
//! installer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use hearth_core::{CancellationToken, CatalogEntry, HearthError, HearthResult, PackageName};
use hearth_env::Installer;
use tokio::sync::{Semaphore, watch};

/// File every double writes, holding `name@version`.
pub const MARKER_FILE: &str = "installed.txt";

/// `staging` must already exist; like a real installer this never creates it.
async fn write_marker(entry: &CatalogEntry, staging: &Path) -> HearthResult<()> {
    let marker = staging.join(MARKER_FILE);
    tokio::fs::write(&marker, format!("{}@{}", entry.name, entry.version))
        .await
        .map_err(|e| HearthError::storage(&marker, &e))
}

/// Installs successfully and records every call.
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    calls: Mutex<Vec<(PackageName, String)>>,
}

impl RecordingInstaller {
    /// Create a recording installer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(name, version)` of every install, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(PackageName, String)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Installer for RecordingInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        _cancel: &CancellationToken,
    ) -> HearthResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((entry.name.clone(), entry.version.clone()));
        write_marker(entry, staging).await
    }
}

/// Writes partial artifacts, then fails.
#[derive(Debug)]
pub struct FailingInstaller {
    reason: String,
    attempts: AtomicUsize,
}

impl FailingInstaller {
    /// Fail every install with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of installs attempted.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingInstaller {
    fn default() -> Self {
        Self::new("network unreachable")
    }
}

#[async_trait]
impl Installer for FailingInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        _cancel: &CancellationToken,
    ) -> HearthResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        write_marker(entry, staging).await?;
        Err(HearthError::InstallFailed {
            package: entry.name.to_string(),
            reason: self.reason.clone(),
        })
    }
}

/// Blocks every install until the test opens the gate.
///
/// Each [`open`](Self::open) lets one waiting install through. Installs
/// observe cancellation while parked at the gate.
#[derive(Debug)]
pub struct GatedInstaller {
    gate: Semaphore,
    started: watch::Sender<usize>,
    finished: AtomicUsize,
}

impl Default for GatedInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedInstaller {
    /// Create a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: watch::Sender::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    /// Let `n` parked or future installs through.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Installs that reached the gate so far.
    #[must_use]
    pub fn started(&self) -> usize {
        *self.started.borrow()
    }

    /// Installs that passed the gate and wrote their artifacts.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` installs reached the gate.
    pub async fn wait_started(&self, n: usize) {
        let mut rx = self.started.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

#[async_trait]
impl Installer for GatedInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> HearthResult<()> {
        self.started.send_modify(|count| *count = count.saturating_add(1));
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(HearthError::Cancelled(format!("install {}", entry.name)));
            }
            permit = self.gate.acquire() => {
                permit
                    .map_err(|_| HearthError::InstallFailed {
                        package: entry.name.to_string(),
                        reason: "gate closed".to_string(),
                    })?
                    .forget();
            }
        }
        write_marker(entry, staging).await?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
