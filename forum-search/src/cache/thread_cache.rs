use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::tiered::{CacheStats, TieredCache};
use crate::domain::models::{ChannelId, Message, Thread, ThreadId, ThreadStats};

/// Values stored by [`ThreadCache`]; one keyspace, one storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ThreadCacheEntry {
    Stats(ThreadStats),
    Messages(Vec<Message>),
    Threads(Vec<Thread>),
}

fn stats_key(thread: ThreadId) -> String {
    format!("thread:{thread}:stats")
}

fn messages_key(thread: ThreadId, page: u32) -> String {
    format!("thread:{thread}:msgs:p{page}")
}

fn forum_key(forum: ChannelId) -> String {
    format!("forum:{forum}:threads")
}

/// Typed, key-namespaced view over a [`TieredCache`].
///
/// Every key of a thread starts with `thread:{id}:` so the whole thread can
/// be invalidated with one pattern.
#[derive(Clone)]
pub struct ThreadCache {
    inner: Arc<TieredCache<ThreadCacheEntry>>,
}

impl ThreadCache {
    pub fn new(inner: TieredCache<ThreadCacheEntry>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn get_stats(&self, thread: ThreadId) -> Option<ThreadStats> {
        match self.inner.get(&stats_key(thread)).await? {
            ThreadCacheEntry::Stats(stats) => Some(stats),
            _ => None,
        }
    }

    pub async fn set_stats(&self, thread: ThreadId, stats: ThreadStats) {
        self.inner
            .set(&stats_key(thread), ThreadCacheEntry::Stats(stats))
            .await;
    }

    pub async fn get_messages(&self, thread: ThreadId, page: u32) -> Option<Vec<Message>> {
        match self.inner.get(&messages_key(thread, page)).await? {
            ThreadCacheEntry::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    pub async fn set_messages(&self, thread: ThreadId, page: u32, messages: Vec<Message>) {
        self.inner
            .set(
                &messages_key(thread, page),
                ThreadCacheEntry::Messages(messages),
            )
            .await;
    }

    pub async fn get_forum_threads(&self, forum: ChannelId) -> Option<Vec<Thread>> {
        match self.inner.get(&forum_key(forum)).await? {
            ThreadCacheEntry::Threads(threads) => Some(threads),
            _ => None,
        }
    }

    pub async fn set_forum_threads(&self, forum: ChannelId, threads: Vec<Thread>) {
        self.inner
            .set(&forum_key(forum), ThreadCacheEntry::Threads(threads))
            .await;
    }

    /// Drop stats and every message page of a thread.
    pub async fn invalidate_thread(&self, thread: ThreadId) -> usize {
        self.inner
            .invalidate_pattern(&format!("thread:{thread}:"))
            .await
    }

    pub async fn invalidate_forum(&self, forum: ChannelId) -> bool {
        self.inner.invalidate(&forum_key(forum)).await
    }

    pub async fn cleanup(&self) -> usize {
        self.inner.cleanup().await
    }

    pub fn start_cleanup_task(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        self.inner.clone().start_cleanup_task(every, shutdown)
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}
