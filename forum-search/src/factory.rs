//! Composition root: turns [`Settings`] into wired search components.
//!
//! This is the only place that imports concrete outbound adapters.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    adapters::outbound::RedisRemoteCache,
    cache::{CacheManager, TieredCacheConfig},
    config::{CacheSettings, SearchSettings, Settings},
    domain::{
        ports::outbound::{MessageSource, RemoteCache, ThreadSource},
        search::{
            ForumSearch, OrchestratorConfig, RetryPolicy, ScannerConfig, SearchOrchestrator,
            ServiceConfig, ThreadScanner,
        },
    },
};

/// Build the cache layer, attaching Redis when a URL is configured.
///
/// A bad Redis URL degrades to local-only caching.
pub fn build_cache(settings: &CacheSettings) -> CacheManager {
    let remote: Option<Arc<dyn RemoteCache>> = settings.redis_url.as_deref().and_then(|url| {
        match RedisRemoteCache::connect(url, settings.key_prefix.as_str(), settings.redis_pool_size)
        {
            Ok(cache) => {
                info!(prefix = %settings.key_prefix, "Using Redis as shared cache tier");
                Some(Arc::new(cache) as Arc<dyn RemoteCache>)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, caching locally only");
                None
            }
        }
    });

    CacheManager::new(
        thread_cache_config(settings),
        general_cache_config(settings),
        remote,
    )
}

fn thread_cache_config(settings: &CacheSettings) -> TieredCacheConfig {
    TieredCacheConfig {
        ttl: settings.ttl(),
        max_items: settings.thread_cache_size,
        reconnect_cooldown: settings.reconnect_cooldown(),
    }
}

fn general_cache_config(settings: &CacheSettings) -> TieredCacheConfig {
    TieredCacheConfig {
        ttl: settings.ttl(),
        max_items: settings.max_items,
        reconnect_cooldown: settings.reconnect_cooldown(),
    }
}

pub fn scanner_config(settings: &SearchSettings) -> ScannerConfig {
    ScannerConfig {
        concurrency_limit: settings.concurrency_limit,
        retry: RetryPolicy {
            max_retries: settings.max_retries,
            max_total_wait: settings.max_retry_wait(),
        },
        ..Default::default()
    }
}

pub fn orchestrator_config(settings: &SearchSettings) -> OrchestratorConfig {
    OrchestratorConfig {
        max_results: settings.max_results,
        archived_batch_size: settings.archived_batch_size,
        progress_interval: settings.progress_interval(),
        archive_retry_limit: settings.archive_retry_limit,
        archive_retry_backoff: settings.archive_retry_backoff(),
    }
}

pub fn service_config(search: &SearchSettings) -> ServiceConfig {
    ServiceConfig {
        results_per_page: search.results_per_page,
        history_length: search.history_length,
        session_max_age: search.session_max_age(),
        session_sweep_interval: search.session_sweep_interval(),
    }
}

/// Wire a [`ForumSearch`] over a platform that serves both threads and messages.
pub fn build_search<P>(
    settings: &Settings,
    platform: Arc<P>,
    cache: &CacheManager,
) -> ForumSearch<P, P>
where
    P: ThreadSource + MessageSource,
{
    let scanner = ThreadScanner::new(
        Arc::clone(&platform),
        cache.threads().clone(),
        scanner_config(&settings.search),
    );
    let orchestrator =
        SearchOrchestrator::new(platform, scanner, orchestrator_config(&settings.search));

    ForumSearch::new(orchestrator, service_config(&settings.search))
}
