//! The environment registry: environment table plus live managers.
//!
//! Every environment that has been touched gets a slot. The slot holds a
//! single-flight cell for its [`PackageManager`], the set of sessions bound
//! to it, and a lifecycle lock that makes binding and deletion mutually
//! exclusive. The slot map itself is only used for lookup and insert, so
//! work on one environment never waits on another.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use dashmap::DashMap;
use hearth_catalog::CatalogClient;
use hearth_core::{Environment, EnvironmentName, HearthError, HearthResult, SessionId};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::installer::Installer;
use crate::manager::{ManagerSettings, PackageManager};
use crate::store::EnvironmentStore;

#[derive(Debug, Default)]
struct EnvSlot {
    manager: OnceCell<Arc<PackageManager>>,
    lifecycle: Mutex<()>,
    sessions: StdMutex<HashSet<SessionId>>,
    deleted: AtomicBool,
}

impl EnvSlot {
    fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Façade over the environment store and the live-manager table.
#[derive(Debug)]
pub struct EnvironmentRegistry {
    store: EnvironmentStore,
    catalog: Arc<CatalogClient>,
    installer: Arc<dyn Installer>,
    settings: ManagerSettings,
    default_environment: EnvironmentName,
    slots: DashMap<EnvironmentName, Arc<EnvSlot>>,
    index_loads: AtomicU64,
}

impl EnvironmentRegistry {
    /// Create a registry whose new sessions bind to `default_environment`.
    #[must_use]
    pub fn new(
        store: EnvironmentStore,
        catalog: Arc<CatalogClient>,
        installer: Arc<dyn Installer>,
        default_environment: EnvironmentName,
    ) -> Self {
        Self {
            store,
            catalog,
            installer,
            settings: ManagerSettings::default(),
            default_environment,
            slots: DashMap::new(),
            index_loads: AtomicU64::new(0),
        }
    }

    /// Set the settings handed to every manager.
    #[must_use]
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Environment new sessions bind to.
    #[must_use]
    pub fn default_environment(&self) -> &EnvironmentName {
        &self.default_environment
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &EnvironmentStore {
        &self.store
    }

    /// The shared catalog client.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogClient> {
        &self.catalog
    }

    /// How many index loads (manager constructions) have run.
    #[must_use]
    pub fn index_loads(&self) -> u64 {
        self.index_loads.load(Ordering::SeqCst)
    }

    fn slot(&self, name: &EnvironmentName) -> Arc<EnvSlot> {
        self.slots.entry(name.clone()).or_default().clone()
    }

    fn drop_slot(&self, name: &EnvironmentName, slot: &Arc<EnvSlot>) {
        self.slots.remove_if(name, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Return the environment, creating it if absent. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] when the storage root cannot be created.
    pub fn ensure(&self, name: &EnvironmentName) -> HearthResult<Environment> {
        self.store.ensure(name)
    }

    /// Create a new environment.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::EnvironmentExists`] if it already exists.
    pub fn create(&self, name: &EnvironmentName) -> HearthResult<Environment> {
        self.store.create(name)
    }

    /// Look up an environment without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if its metadata is unreadable.
    pub fn get(&self, name: &EnvironmentName) -> HearthResult<Option<Environment>> {
        self.store.get(name)
    }

    /// All environments, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Storage`] if storage cannot be read.
    pub fn list(&self) -> HearthResult<Vec<Environment>> {
        self.store.list()
    }

    /// Number of sessions bound to `name`.
    #[must_use]
    pub fn bound_sessions(&self, name: &EnvironmentName) -> usize {
        self.slots
            .get(name)
            .map_or(0, |slot| slot.session_count())
    }

    /// The live manager for `name`, loading it on first use.
    ///
    /// Concurrent first callers share one load and receive the same
    /// instance. A failed load is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::EnvironmentNotFound`] if the environment does
    /// not exist, or the load error ([`HearthError::IndexCorrupt`], ...).
    pub async fn get_manager(&self, name: &EnvironmentName) -> HearthResult<Arc<PackageManager>> {
        loop {
            let slot = self.slot(name);
            let manager = self.manager_for(name, &slot).await?;
            if slot.deleted.load(Ordering::SeqCst) {
                // Raced with a delete; the next slot reflects storage.
                self.drop_slot(name, &slot);
                continue;
            }
            return Ok(manager);
        }
    }

    async fn manager_for(
        &self,
        name: &EnvironmentName,
        slot: &EnvSlot,
    ) -> HearthResult<Arc<PackageManager>> {
        let manager = slot
            .manager
            .get_or_try_init(|| async {
                let environment = self
                    .store
                    .get(name)?
                    .ok_or_else(|| HearthError::EnvironmentNotFound(name.to_string()))?;
                self.index_loads.fetch_add(1, Ordering::SeqCst);
                let manager = PackageManager::load(
                    environment,
                    Arc::clone(&self.catalog),
                    Arc::clone(&self.installer),
                    self.settings.clone(),
                )
                .await?;
                Ok::<_, HearthError>(Arc::new(manager))
            })
            .await?;
        Ok(Arc::clone(manager))
    }

    /// Bind `session` to `name`, creating the environment if needed.
    ///
    /// Holds the environment's lifecycle lock, so a concurrent
    /// [`delete`](Self::delete) either completes first or sees the binding.
    ///
    /// # Errors
    ///
    /// Returns storage or manager-load errors; the session stays unbound.
    pub async fn attach(
        &self,
        name: &EnvironmentName,
        session: SessionId,
    ) -> HearthResult<Arc<PackageManager>> {
        loop {
            let slot = self.slot(name);
            let _lifecycle = slot.lifecycle.lock().await;
            if slot.deleted.load(Ordering::SeqCst) {
                self.drop_slot(name, &slot);
                continue;
            }

            self.store.ensure(name)?;
            let manager = self.manager_for(name, &slot).await?;
            slot.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(session);
            debug!(environment = %name, %session, "Session bound");
            return Ok(manager);
        }
    }

    /// Release `session`'s binding to `name`. Never blocks on async locks.
    pub fn detach(&self, name: &EnvironmentName, session: SessionId) {
        if let Some(slot) = self.slots.get(name) {
            slot.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&session);
            debug!(environment = %name, %session, "Session unbound");
        }
    }

    /// Delete an environment and its cached manager.
    ///
    /// Destructive and irreversible.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::EnvironmentInUse`] if any session is bound,
    /// [`HearthError::EnvironmentNotFound`] if it does not exist, or
    /// [`HearthError::Storage`] if its storage cannot be removed.
    pub async fn delete(&self, name: &EnvironmentName) -> HearthResult<()> {
        let slot = self.slot(name);
        let _lifecycle = slot.lifecycle.lock().await;

        if slot.deleted.load(Ordering::SeqCst) {
            self.drop_slot(name, &slot);
            return Err(HearthError::EnvironmentNotFound(name.to_string()));
        }

        let sessions = slot.session_count();
        if sessions > 0 {
            return Err(HearthError::EnvironmentInUse {
                name: name.to_string(),
                sessions,
            });
        }

        // Callers that took the manager through `get_manager` may still be
        // installing; from here on their commits fail.
        let retired = match slot.manager.get() {
            Some(manager) => {
                manager.retire().await;
                true
            },
            None => false,
        };

        if let Err(e) = self.store.remove_storage(name) {
            if retired || matches!(e, HearthError::EnvironmentNotFound(_)) {
                slot.deleted.store(true, Ordering::SeqCst);
                self.drop_slot(name, &slot);
            }
            return Err(e);
        }

        slot.deleted.store(true, Ordering::SeqCst);
        // A load that finished while storage was being removed.
        if !retired && let Some(manager) = slot.manager.get() {
            manager.retire().await;
        }
        self.drop_slot(name, &slot);
        info!(environment = %name, "Deleted environment");
        Ok(())
    }
}
