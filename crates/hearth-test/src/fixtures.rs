//! Test fixtures for common types and a temporary-home registry.

use std::sync::{Arc, Once};
use std::time::Duration;

use hearth_catalog::{CatalogClient, CatalogSource, StalePolicy};
use hearth_core::{
    CancellationToken, CatalogEntry, EnvironmentName, HearthHome, PackageKind, PackageName,
    SessionId,
};
use hearth_env::{EnvironmentRegistry, EnvironmentStore, Installer, ManagerSettings};
use tempfile::TempDir;

use crate::catalog::StaticCatalogSource;
use crate::installers::RecordingInstaller;

/// The `french-skill 1.2.0` ability.
#[must_use]
pub fn french_skill_entry() -> CatalogEntry {
    entry("french-skill", "1.2.0", PackageKind::Ability, "git://x/french")
}

/// Build a catalog entry, panicking on a malformed name.
///
/// # Panics
///
/// Panics if `name` is not a valid package name.
#[must_use]
pub fn entry(name: &str, version: &str, kind: PackageKind, source_ref: &str) -> CatalogEntry {
    CatalogEntry::new(name, version, kind, source_ref).expect("valid fixture package name")
}

/// A small mixed catalog: `french-skill` in two versions, an app, a library.
#[must_use]
pub fn sample_catalog() -> Vec<CatalogEntry> {
    vec![
        entry("french-skill", "1.1.0", PackageKind::Ability, "git://x/french#v1.1.0"),
        french_skill_entry(),
        entry("timer", "0.3.1", PackageKind::App, "git://x/timer"),
        entry("nlp-core", "2.0.0", PackageKind::Library, "git://x/nlp"),
    ]
}

/// Environment name, panicking on a malformed name.
///
/// # Panics
///
/// Panics if `name` is not a valid environment name.
#[must_use]
pub fn env_name(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).expect("valid fixture environment name")
}

/// Package name, panicking on a malformed name.
///
/// # Panics
///
/// Panics if `name` is not a valid package name.
#[must_use]
pub fn package_name(name: &str) -> PackageName {
    PackageName::new(name).expect("valid fixture package name")
}

/// Install a test subscriber once per process. Honours `RUST_LOG`.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Builder for a registry rooted in a fresh temporary home.
#[derive(Debug)]
pub struct RegistryFixture {
    entries: Vec<CatalogEntry>,
    installer: Arc<dyn Installer>,
    default_environment: EnvironmentName,
    stale_policy: StalePolicy,
    freshness: Option<Duration>,
    settings: ManagerSettings,
}

impl Default for RegistryFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryFixture {
    /// Empty catalog, [`RecordingInstaller`], default environment `default`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            installer: Arc::new(RecordingInstaller::new()),
            default_environment: env_name("default"),
            stale_policy: StalePolicy::Strict,
            freshness: None,
            settings: ManagerSettings::default(),
        }
    }

    /// Add one catalog entry.
    #[must_use]
    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add several catalog entries.
    #[must_use]
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Use `installer` for every environment.
    #[must_use]
    pub fn with_installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }

    /// Bind new sessions to `name`.
    #[must_use]
    pub fn with_default_environment(mut self, name: &str) -> Self {
        self.default_environment = env_name(name);
        self
    }

    /// Serve stale catalog data when a refresh fails.
    #[must_use]
    pub fn allow_stale(mut self) -> Self {
        self.stale_policy = StalePolicy::AllowStale;
        self
    }

    /// Override the catalog cache freshness window.
    #[must_use]
    pub fn with_catalog_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = Some(freshness);
        self
    }

    /// Override manager settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create the home directory and the registry.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn build(self) -> TestRegistry {
        init_test_logging();
        let home = tempfile::tempdir().expect("create temporary hearth home");
        let source = Arc::new(StaticCatalogSource::new(self.entries));
        let mut catalog = CatalogClient::new(Arc::clone(&source) as Arc<dyn CatalogSource>)
            .with_stale_policy(self.stale_policy);
        if let Some(freshness) = self.freshness {
            catalog = catalog.with_freshness(freshness);
        }
        let catalog = Arc::new(catalog);
        let registry = EnvironmentRegistry::new(
            EnvironmentStore::new(HearthHome::from_path(home.path())),
            catalog,
            self.installer,
            self.default_environment,
        )
        .with_settings(self.settings);

        TestRegistry {
            home,
            source,
            registry: Arc::new(registry),
        }
    }
}

/// A registry over a temporary home, removed on drop.
#[derive(Debug)]
pub struct TestRegistry {
    /// Temporary home directory.
    pub home: TempDir,
    /// The catalog source behind the registry's client.
    pub source: Arc<StaticCatalogSource>,
    /// The registry under test.
    pub registry: Arc<EnvironmentRegistry>,
}

impl TestRegistry {
    /// Environment name shorthand.
    #[must_use]
    pub fn env(&self, name: &str) -> EnvironmentName {
        env_name(name)
    }

    /// Package name shorthand.
    #[must_use]
    pub fn package(&self, name: &str) -> PackageName {
        package_name(name)
    }

    /// A fresh session id.
    #[must_use]
    pub fn session(&self) -> SessionId {
        SessionId::new()
    }

    /// A fresh, uncancelled token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}
