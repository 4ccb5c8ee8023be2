//! Prometheus metrics for the directory cache.

use std::sync::Arc;

use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use time::OffsetDateTime;

use crate::domain::DirectoryProvider;

const NAMESPACE: &str = "llmariner";

/// Seconds elapsed since the directory cache last synchronised, sampled on
/// every scrape.
pub struct SyncMetrics {
    registry: Registry,
    directory: Arc<dyn DirectoryProvider>,
    since_last_cache_sync: Gauge,
}

impl SyncMetrics {
    /// # Errors
    ///
    /// Returns an error if the gauge cannot be registered.
    pub fn new(directory: Arc<dyn DirectoryProvider>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let since_last_cache_sync = Gauge::with_opts(
            Opts::new(
                "rbac_server_since_last_cache_sync_sec",
                "Seconds since the directory cache last synchronised",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(since_last_cache_sync.clone()))?;

        Ok(Self {
            registry,
            directory,
            since_last_cache_sync,
        })
    }

    /// Update the gauge as of `now`. Left untouched until the first sync.
    pub fn refresh(&self, now: OffsetDateTime) {
        if let Some(at) = self.directory.last_synced_at() {
            self.since_last_cache_sync
                .set((now - at).as_seconds_f64().max(0.0));
        }
    }

    /// Text exposition of every registered metric.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.refresh(OffsetDateTime::now_utc());
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}
