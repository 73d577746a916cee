//! In-memory catalog source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hearth_catalog::CatalogSource;
use hearth_core::{CatalogEntry, HearthError, HearthResult};

/// A [`CatalogSource`] serving a fixed, swappable list of entries.
///
/// Counts fetches and can be told to fail or to stall, which is enough to
/// drive every cache path of the catalog client.
#[derive(Debug, Default)]
pub struct StaticCatalogSource {
    entries: Mutex<Vec<CatalogEntry>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicU64,
}

impl StaticCatalogSource {
    /// Create a source serving `entries`.
    #[must_use]
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Delay every fetch by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Replace the served entries.
    pub fn set_entries(&self, entries: Vec<CatalogEntry>) {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries;
    }

    /// Make subsequent fetches fail with `CatalogUnavailable` (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    fn location(&self) -> &str {
        "memory://static"
    }

    async fn fetch(&self) -> HearthResult<Vec<CatalogEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(HearthError::CatalogUnavailable(
                "memory://static: source offline".to_string(),
            ));
        }
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_catalog;

    #[tokio::test]
    async fn serves_and_counts() {
        let source = StaticCatalogSource::new(sample_catalog());
        assert_eq!(source.fetch().await.unwrap().len(), sample_catalog().len());
        source.set_failing(true);
        assert!(matches!(
            source.fetch().await,
            Err(HearthError::CatalogUnavailable(_))
        ));
        assert_eq!(source.fetch_count(), 2);
    }
}
