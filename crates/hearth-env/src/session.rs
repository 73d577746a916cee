//! Per-caller binding to one active environment.
//!
//! A [`SessionContext`] only exists in the bound state: [`SessionContext::create`]
//! binds the registry's default environment, [`SessionContext::switch_environment`]
//! rebinds, and [`SessionContext::destroy`] (or dropping the value) releases
//! the binding.

use std::sync::{Arc, PoisonError, RwLock};

use hearth_core::{
    CancellationToken, EnvironmentName, HearthResult, Package, PackageName, SessionId,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::manager::PackageManager;
use crate::registry::EnvironmentRegistry;

#[derive(Debug)]
struct Binding {
    environment: EnvironmentName,
    manager: Arc<PackageManager>,
}

/// One caller's view of the package world.
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    registry: Arc<EnvironmentRegistry>,
    binding: RwLock<Arc<Binding>>,
    switch_lock: Mutex<()>,
}

impl SessionContext {
    /// Open a session bound to the registry's default environment.
    ///
    /// # Errors
    ///
    /// Returns storage or manager-load errors for the default environment.
    pub async fn create(registry: Arc<EnvironmentRegistry>) -> HearthResult<Self> {
        let environment = registry.default_environment().clone();
        Self::create_in(registry, environment).await
    }

    /// Open a session bound to `environment`.
    ///
    /// # Errors
    ///
    /// Returns storage or manager-load errors for `environment`.
    pub async fn create_in(
        registry: Arc<EnvironmentRegistry>,
        environment: EnvironmentName,
    ) -> HearthResult<Self> {
        let id = SessionId::new();
        let manager = registry.attach(&environment, id).await?;
        info!(session = %id, environment = %environment, "Session created");
        Ok(Self {
            id,
            registry,
            binding: RwLock::new(Arc::new(Binding {
                environment,
                manager,
            })),
            switch_lock: Mutex::new(()),
        })
    }

    fn binding(&self) -> Arc<Binding> {
        Arc::clone(&self.binding.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// This session's id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// The environment this session is bound to.
    #[must_use]
    pub fn current_environment(&self) -> EnvironmentName {
        self.binding().environment.clone()
    }

    /// The manager for the current environment.
    #[must_use]
    pub fn package_manager(&self) -> Arc<PackageManager> {
        Arc::clone(&self.binding().manager)
    }

    /// Rebind this session to `name`, creating the environment if needed.
    ///
    /// The new binding is registered before the old one is released, and
    /// readers observe either binding in full. Concurrent switches on the
    /// same session apply one at a time. Other sessions are unaffected.
    ///
    /// # Errors
    ///
    /// Returns storage or manager-load errors; the session keeps its old
    /// binding.
    pub async fn switch_environment(&self, name: &EnvironmentName) -> HearthResult<()> {
        let _switching = self.switch_lock.lock().await;

        let current = self.binding();
        if &current.environment == name {
            debug!(session = %self.id, environment = %name, "Already bound");
            return Ok(());
        }

        let manager = self.registry.attach(name, self.id).await?;
        let old = {
            let mut slot = self.binding.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(
                &mut *slot,
                Arc::new(Binding {
                    environment: name.clone(),
                    manager,
                }),
            )
        };
        self.registry.detach(&old.environment, self.id);

        info!(
            session = %self.id,
            from = %old.environment,
            to = %name,
            "Switched environment"
        );
        Ok(())
    }

    /// Installed packages in the current environment.
    #[must_use]
    pub fn list_packages(&self) -> Vec<Package> {
        self.binding().manager.list()
    }

    /// Install into the current environment.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::install`].
    pub async fn install(
        &self,
        name: &PackageName,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> HearthResult<Package> {
        let manager = self.package_manager();
        manager.install(name, version, cancel).await
    }

    /// Remove from the current environment.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::remove`].
    pub async fn remove(&self, name: &PackageName) -> HearthResult<Package> {
        let manager = self.package_manager();
        manager.remove(name).await
    }

    /// End the session and release its binding.
    pub fn destroy(self) {
        debug!(session = %self.id, "Destroying session");
        drop(self);
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        let environment = self.binding().environment.clone();
        self.registry.detach(&environment, self.id);
        info!(session = %self.id, environment = %environment, "Session closed");
    }
}
