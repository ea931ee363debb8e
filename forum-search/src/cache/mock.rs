//! In-memory remote cache for tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::domain::ports::outbound::{RemoteCache, RemoteCacheError};

/// Remote cache backed by a `HashMap`, with a switch that makes every call fail.
#[derive(Default)]
pub struct MockRemoteCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
    get_calls: AtomicUsize,
    total_calls: AtomicUsize,
    ping_calls: AtomicUsize,
}

impl MockRemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let cache = Self::default();
        cache.set_failing(true);
        cache
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RemoteCacheError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteCacheError::Connection("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCache for MockRemoteCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteCacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(
        &self,
        key: &str,
        value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), RemoteCacheError> {
        self.check()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, RemoteCacheError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().remove(key).map_or(0, |_| 1))
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, RemoteCacheError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), RemoteCacheError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}
