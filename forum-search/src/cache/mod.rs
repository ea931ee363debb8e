//! Caching for expensive per-thread lookups.
//!
//! [`TieredCache`] is the generic two-level store; [`ThreadCache`] is the typed
//! facade the scanner uses. [`CacheManager`] owns both caches of a process and
//! their background cleanup.

#[cfg(test)]
pub(crate) mod mock;
mod thread_cache;
mod tiered;

use std::{sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use thread_cache::{ThreadCache, ThreadCacheEntry};
pub use tiered::{CacheStats, TieredCache, TieredCacheConfig};

use crate::domain::ports::outbound::RemoteCache;

/// The caches shared by every search of one process.
#[derive(Clone)]
pub struct CacheManager {
    threads: ThreadCache,
    general: Arc<TieredCache<serde_json::Value>>,
}

impl CacheManager {
    pub fn new(
        thread_config: TieredCacheConfig,
        general_config: TieredCacheConfig,
        remote: Option<Arc<dyn RemoteCache>>,
    ) -> Self {
        let mut threads = TieredCache::new("threads", thread_config);
        let mut general = TieredCache::new("general", general_config);
        if let Some(remote) = remote {
            threads = threads.with_remote(remote.clone());
            general = general.with_remote(remote);
        }

        Self {
            threads: ThreadCache::new(threads),
            general: Arc::new(general),
        }
    }

    /// Local-only caches with default limits.
    pub fn local() -> Self {
        Self::new(
            TieredCacheConfig::default(),
            TieredCacheConfig::default(),
            None,
        )
    }

    pub fn threads(&self) -> &ThreadCache {
        &self.threads
    }

    /// Look up a computed statistic stored under `key`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.general.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.general.set(key, encoded).await,
            Err(e) => warn!(key, error = %e, "Failed to encode value for cache"),
        }
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        self.general.invalidate(key).await
    }

    pub async fn stats(&self) -> Vec<CacheStats> {
        vec![self.threads.stats().await, self.general.stats().await]
    }

    /// Start the periodic expiry sweep of both caches.
    pub fn start_background_tasks(
        &self,
        every: Duration,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        vec![
            self.threads.start_cleanup_task(every, shutdown.clone()),
            self.general.clone().start_cleanup_task(every, shutdown),
        ]
    }
}
