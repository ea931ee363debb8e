use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RemoteCacheError {
    #[error("remote cache connection failed: {0}")]
    Connection(String),
    #[error("remote cache command failed: {0}")]
    Command(String),
}

/// Outbound port for the shared second-level cache (e.g. Redis).
///
/// Values are opaque bytes; the tiered cache owns (de)serialization.
#[async_trait]
pub trait RemoteCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteCacheError>;

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> Result<(), RemoteCacheError>;

    /// Returns the number of keys removed.
    async fn delete(&self, key: &str) -> Result<u64, RemoteCacheError>;

    /// Server-side scan for keys containing `pattern`, deleting every match.
    ///
    /// Returns the number of keys removed.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, RemoteCacheError>;

    /// Liveness check used when reconnecting.
    async fn ping(&self) -> Result<(), RemoteCacheError>;
}
