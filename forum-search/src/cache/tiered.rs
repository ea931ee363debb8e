//! Local TTL cache with an optional shared remote layer.
//!
//! Reads try the local store, then the remote layer; writes go to both.
//! A failing remote layer is marked unavailable and skipped until the
//! reconnect cooldown has passed, so callers never see remote errors.

use std::{collections::HashMap, marker::PhantomData, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::ports::outbound::{RemoteCache, RemoteCacheError};

#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    pub ttl: Duration,
    pub max_items: usize,
    /// Minimum time between reconnect attempts after a remote failure
    pub reconnect_cooldown: Duration,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_items: 10_000,
            reconnect_cooldown: Duration::from_secs(60),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy)]
enum RemoteStatus {
    Available,
    Unavailable { since: Instant },
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    local_hits: u64,
    remote_hits: u64,
    misses: u64,
    sets: u64,
    invalidations: u64,
    evictions: u64,
    expired_removed: u64,
    remote_errors: u64,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    remote_status: RemoteStatus,
    counters: Counters,
}

/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub local_entries: usize,
    pub max_items: usize,
    pub ttl_secs: u64,
    pub local_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub expired_removed: u64,
    pub remote_errors: u64,
    pub remote_configured: bool,
    pub remote_available: bool,
    pub hit_rate_pct: f64,
}

/// Two-level cache of serializable values keyed by string.
///
/// All local state sits behind one async mutex; remote I/O always happens
/// with the lock released.
pub struct TieredCache<V> {
    name: String,
    config: TieredCacheConfig,
    remote: Option<Arc<dyn RemoteCache>>,
    state: Mutex<CacheState<V>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, config: TieredCacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            remote: None,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                remote_status: RemoteStatus::Available,
                counters: Counters::default(),
            }),
            _value: PhantomData,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteCache>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.entries.get(key) {
                if entry.inserted_at + self.config.ttl > now {
                    let value = entry.value.clone();
                    state.counters.local_hits += 1;
                    return Some(value);
                }
                state.entries.remove(key);
                state.counters.expired_removed += 1;
            }
        }

        if let Some(remote) = self.usable_remote().await {
            match remote.get(key).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<V>(&bytes) {
                    Ok(value) => {
                        let mut state = self.state.lock().await;
                        self.mark_available(&mut state);
                        self.insert_local(&mut state, key, value.clone());
                        state.counters.remote_hits += 1;
                        return Some(value);
                    }
                    Err(e) => {
                        warn!(cache = %self.name, key, error = %e, "Discarding undecodable remote cache value");
                    }
                },
                Ok(None) => {
                    let mut state = self.state.lock().await;
                    self.mark_available(&mut state);
                }
                Err(e) => {
                    let mut state = self.state.lock().await;
                    self.mark_unavailable(&mut state, &e);
                }
            }
        }

        self.state.lock().await.counters.misses += 1;
        None
    }

    /// Store locally and write through to the remote layer.
    ///
    /// Remote failures are logged and never affect the local write.
    pub async fn set(&self, key: &str, value: V) {
        let encoded = self
            .remote
            .as_ref()
            .map(|_| serde_json::to_vec(&value))
            .transpose();

        {
            let mut state = self.state.lock().await;
            self.insert_local(&mut state, key, value);
            state.counters.sets += 1;
        }

        let bytes = match encoded {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!(cache = %self.name, key, error = %e, "Failed to encode value for remote cache");
                return;
            }
        };

        if let Some(remote) = self.usable_remote().await {
            if let Err(e) = remote.set_ex(key, bytes, self.config.ttl).await {
                let mut state = self.state.lock().await;
                self.mark_unavailable(&mut state, &e);
            }
        }
    }

    /// Remove one key from both layers. Returns whether it was cached locally.
    pub async fn invalidate(&self, key: &str) -> bool {
        let removed = {
            let mut state = self.state.lock().await;
            let removed = state.entries.remove(key).is_some();
            if removed {
                state.counters.invalidations += 1;
            }
            removed
        };

        if let Some(remote) = self.usable_remote().await {
            if let Err(e) = remote.delete(key).await {
                let mut state = self.state.lock().await;
                self.mark_unavailable(&mut state, &e);
            }
        }
        removed
    }

    /// Remove every key containing `pattern` from both layers.
    ///
    /// Returns the number of local entries removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let removed = {
            let mut state = self.state.lock().await;
            let before = state.entries.len();
            state.entries.retain(|key, _| !key.contains(pattern));
            let removed = before - state.entries.len();
            state.counters.invalidations += removed as u64;
            removed
        };

        if let Some(remote) = self.usable_remote().await {
            match remote.delete_matching(pattern).await {
                Ok(count) => debug!(cache = %self.name, pattern, count, "Invalidated remote keys"),
                Err(e) => {
                    let mut state = self.state.lock().await;
                    self.mark_unavailable(&mut state, &e);
                }
            }
        }
        removed
    }

    /// Drop expired local entries and retry a down remote layer.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup(&self) -> usize {
        let removed = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let ttl = self.config.ttl;
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.inserted_at + ttl > now);
            let removed = before - state.entries.len();
            state.counters.expired_removed += removed as u64;
            removed
        };

        if removed > 0 {
            debug!(cache = %self.name, removed, "Removed expired cache entries");
        }

        // Pings the remote layer when its cooldown has elapsed
        self.usable_remote().await;
        removed
    }

    /// Periodically run [`cleanup`](Self::cleanup) until `shutdown` fires.
    pub fn start_cleanup_task(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(cache = %self.name, "Cache cleanup task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.cleanup().await;
                    }
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let c = state.counters;
        let hits = c.local_hits + c.remote_hits;
        let lookups = hits + c.misses;
        let hit_rate_pct = if lookups == 0 {
            0.0
        } else {
            hits as f64 * 100.0 / lookups as f64
        };

        CacheStats {
            name: self.name.clone(),
            local_entries: state.entries.len(),
            max_items: self.config.max_items,
            ttl_secs: self.config.ttl.as_secs(),
            local_hits: c.local_hits,
            remote_hits: c.remote_hits,
            misses: c.misses,
            sets: c.sets,
            invalidations: c.invalidations,
            evictions: c.evictions,
            expired_removed: c.expired_removed,
            remote_errors: c.remote_errors,
            remote_configured: self.remote.is_some(),
            remote_available: self.remote.is_some()
                && matches!(state.remote_status, RemoteStatus::Available),
            hit_rate_pct,
        }
    }

    fn insert_local(&self, state: &mut CacheState<V>, key: &str, value: V) {
        if !state.entries.contains_key(key) && state.entries.len() >= self.config.max_items {
            Self::evict_oldest(state);
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Batch eviction of the oldest fifth of the store.
    fn evict_oldest(state: &mut CacheState<V>) {
        let count = (state.entries.len() / 5).max(1);
        let mut by_age: Vec<(Instant, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.inserted_at, key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(count) {
            state.entries.remove(&key);
        }
        state.counters.evictions += count as u64;
    }

    /// The remote layer if it may be used right now.
    ///
    /// While unavailable, a ping is attempted only once the cooldown since the
    /// last failure has elapsed.
    async fn usable_remote(&self) -> Option<&Arc<dyn RemoteCache>> {
        let remote = self.remote.as_ref()?;

        {
            let state = self.state.lock().await;
            match state.remote_status {
                RemoteStatus::Available => return Some(remote),
                RemoteStatus::Unavailable { since } => {
                    if since.elapsed() < self.config.reconnect_cooldown {
                        return None;
                    }
                }
            }
        }

        let pinged = remote.ping().await;
        let mut state = self.state.lock().await;
        match pinged {
            Ok(()) => {
                self.mark_available(&mut state);
                Some(remote)
            }
            Err(e) => {
                self.mark_unavailable(&mut state, &e);
                None
            }
        }
    }

    fn mark_available(&self, state: &mut CacheState<V>) {
        if matches!(state.remote_status, RemoteStatus::Unavailable { .. }) {
            info!(cache = %self.name, "Remote cache reachable again");
        }
        state.remote_status = RemoteStatus::Available;
    }

    fn mark_unavailable(&self, state: &mut CacheState<V>, error: &RemoteCacheError) {
        state.counters.remote_errors += 1;
        if matches!(state.remote_status, RemoteStatus::Available) {
            warn!(
                cache = %self.name,
                error = %error,
                "Remote cache unavailable, continuing with local cache only"
            );
        }
        state.remote_status = RemoteStatus::Unavailable {
            since: Instant::now(),
        };
    }
}
