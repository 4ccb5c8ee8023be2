//! In-memory directory snapshot and its periodic synchronisation.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rbac_sdk::{Directory, DirectorySource, SourceError};
use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::directory::DirectoryCounts;
use crate::domain::{DirectoryIndex, DirectoryProvider, DomainError};

struct Loaded {
    index: Arc<DirectoryIndex>,
    synced_at: OffsetDateTime,
}

/// Holds the latest directory snapshot.
///
/// Readers get an `Arc` to an immutable index; a sync replaces the whole
/// snapshot in one store, so no request ever observes a partial update.
#[derive(Default)]
pub struct DirectoryCache {
    current: ArcSwapOption<Loaded>,
}

impl DirectoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache preloaded with `directory`.
    #[must_use]
    pub fn with_directory(directory: Directory) -> Self {
        let cache = Self::new();
        cache.store(DirectoryIndex::new(directory), OffsetDateTime::now_utc());
        cache
    }

    pub fn store(&self, index: DirectoryIndex, synced_at: OffsetDateTime) {
        self.current.store(Some(Arc::new(Loaded {
            index: Arc::new(index),
            synced_at,
        })));
    }
}

impl DirectoryProvider for DirectoryCache {
    fn current(&self) -> Result<Arc<DirectoryIndex>, DomainError> {
        self.current
            .load()
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.index))
            .ok_or_else(|| {
                DomainError::UpstreamUnavailable("directory has not been synchronised".to_owned())
            })
    }

    fn last_synced_at(&self) -> Option<OffsetDateTime> {
        self.current.load().as_ref().map(|loaded| loaded.synced_at)
    }
}

/// Refreshes a [`DirectoryCache`] from a [`DirectorySource`].
pub struct DirectorySync {
    cache: Arc<DirectoryCache>,
    source: Arc<dyn DirectorySource>,
    interval: Duration,
}

impl DirectorySync {
    #[must_use]
    pub fn new(
        cache: Arc<DirectoryCache>,
        source: Arc<dyn DirectorySource>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            interval,
        }
    }

    /// Fetch, validate and publish one snapshot.
    ///
    /// # Errors
    ///
    /// Returns the source error; the cache keeps its previous snapshot.
    pub async fn sync_once(&self) -> Result<DirectoryCounts, SourceError> {
        let directory = self.source.fetch().await?;
        directory.validate()?;
        let index = DirectoryIndex::new(directory);
        let counts = index.counts();
        self.cache.store(index, OffsetDateTime::now_utc());
        Ok(counts)
    }

    /// Resync every interval until `cancel` fires. Failures are logged and
    /// the last good snapshot stays in place.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("directory sync stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sync_once().await {
                        Ok(counts) => debug!(
                            users = counts.users,
                            projects = counts.projects,
                            clusters = counts.clusters,
                            "directory synchronised"
                        ),
                        Err(e) => warn!(error = %e, "directory sync failed; keeping previous snapshot"),
                    }
                }
            }
        }
    }
}
