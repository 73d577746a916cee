//! Cached catalog access and version resolution.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hearth_core::{
    CancellationToken, CatalogEntry, HearthError, HearthResult, PackageName, cancellable,
    compare_versions, versions_match,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::source::CatalogSource;

/// Default freshness window.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);

/// What to do when a refresh fails but an expired result is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Surface the failure.
    #[default]
    Strict,
    /// Serve the expired result and log a warning.
    AllowStale,
}

#[derive(Debug)]
struct CachedCatalog {
    entries: Arc<Vec<CatalogEntry>>,
    fetched_at: Instant,
}

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetches answered from a fresh cache.
    pub hits: u64,
    /// Fetches that went to the source.
    pub misses: u64,
    /// Source round-trips that failed.
    pub failures: u64,
    /// Failures answered with an expired result.
    pub stale_served: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    stale_served: AtomicU64,
}

/// Catalog client with a bounded freshness cache.
///
/// The cache lock is held across a refresh, so concurrent misses wait for
/// the single in-flight fetch and then read its result.
#[derive(Debug)]
pub struct CatalogClient {
    source: Arc<dyn CatalogSource>,
    freshness: Duration,
    stale_policy: StalePolicy,
    cache: Mutex<Option<CachedCatalog>>,
    counters: Counters,
}

impl CatalogClient {
    /// Wrap `source` with the default freshness window and strict policy.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            freshness: DEFAULT_FRESHNESS,
            stale_policy: StalePolicy::default(),
            cache: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    /// Set the freshness window. Zero disables caching.
    #[must_use]
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Set the stale policy.
    #[must_use]
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// The underlying source's location.
    #[must_use]
    pub fn location(&self) -> &str {
        self.source.location()
    }

    /// The configured freshness window.
    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Fetch the catalog, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::CatalogUnavailable`] when the source fails and
    /// no stale result may be served, or [`HearthError::Cancelled`] if
    /// `cancel` fires first. Cancellation leaves the cache untouched.
    pub async fn fetch(&self, cancel: &CancellationToken) -> HearthResult<Arc<Vec<CatalogEntry>>> {
        cancellable("catalog fetch", cancel, self.fetch_inner()).await
    }

    /// Drop the cache and fetch from the source.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub async fn refresh(&self, cancel: &CancellationToken) -> HearthResult<Arc<Vec<CatalogEntry>>> {
        cancellable("catalog refresh", cancel, async {
            let mut cache = self.cache.lock().await;
            self.refill(&mut cache, None).await
        })
        .await
    }

    async fn fetch_inner(&self) -> HearthResult<Arc<Vec<CatalogEntry>>> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.freshness
        {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(location = self.location(), "Catalog cache hit");
            return Ok(Arc::clone(&cached.entries));
        }

        let stale = cache.as_ref().map(|c| Arc::clone(&c.entries));
        self.refill(&mut cache, stale).await
    }

    async fn refill(
        &self,
        cache: &mut Option<CachedCatalog>,
        stale: Option<Arc<Vec<CatalogEntry>>>,
    ) -> HearthResult<Arc<Vec<CatalogEntry>>> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(location = self.location(), "Catalog cache miss");

        match self.source.fetch().await {
            Ok(entries) => {
                let entries = Arc::new(entries);
                *cache = Some(CachedCatalog {
                    entries: Arc::clone(&entries),
                    fetched_at: Instant::now(),
                });
                debug!(
                    location = self.location(),
                    count = entries.len(),
                    "Catalog refreshed"
                );
                Ok(entries)
            },
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                match (self.stale_policy, stale) {
                    (StalePolicy::AllowStale, Some(stale)) => {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            location = self.location(),
                            error = %e,
                            "Catalog refresh failed, serving stale result"
                        );
                        Ok(stale)
                    },
                    _ => Err(e),
                }
            },
        }
    }

    /// Resolve `name` to one catalog entry.
    ///
    /// Without `requested`, the highest version by catalog ordering wins.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::PackageNotFound`] if the catalog has no entry
    /// for `name`, [`HearthError::VersionNotFound`] if `requested` is absent,
    /// or any [`fetch`](Self::fetch) error.
    pub async fn resolve(
        &self,
        name: &PackageName,
        requested: Option<&str>,
        cancel: &CancellationToken,
    ) -> HearthResult<CatalogEntry> {
        let entries = self.fetch(cancel).await?;
        select_entry(&entries, name, requested)
    }

    /// Forget the cached result.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Age of the cached result, if any.
    pub async fn cache_age(&self) -> Option<Duration> {
        self.cache.lock().await.as_ref().map(|c| c.fetched_at.elapsed())
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
        }
    }
}

/// Pick the entry for `name` out of a fetched catalog.
///
/// # Errors
///
/// Returns [`HearthError::PackageNotFound`] or [`HearthError::VersionNotFound`].
pub fn select_entry(
    entries: &[CatalogEntry],
    name: &PackageName,
    requested: Option<&str>,
) -> HearthResult<CatalogEntry> {
    let mut candidates = entries.iter().filter(|e| &e.name == name).peekable();
    if candidates.peek().is_none() {
        return Err(HearthError::PackageNotFound(name.to_string()));
    }

    let chosen = match requested {
        Some(version) => candidates
            .find(|e| versions_match(version, &e.version))
            .ok_or_else(|| HearthError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })?,
        None => candidates
            .max_by(|a, b| compare_versions(&a.version, &b.version))
            .ok_or_else(|| HearthError::PackageNotFound(name.to_string()))?,
    };
    Ok(chosen.clone())
}
