use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::{
    bb8::{Pool, PooledConnection, RunError},
    redis::{self, AsyncCommands, RedisError},
    RedisConnectionManager,
};
use tracing::debug;

use crate::domain::ports::outbound::{RemoteCache, RemoteCacheError};

pub type RedisPool = Pool<RedisConnectionManager>;

const SCAN_BATCH: usize = 200;

/// Adapter that backs the shared cache tier with Redis.
///
/// Every key is namespaced with `key_prefix` so several deployments can share
/// one server.
pub struct RedisRemoteCache {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisRemoteCache {
    /// Build a lazily connecting pool; an unreachable server surfaces as
    /// command errors rather than a startup failure.
    pub fn connect(
        redis_url: &str,
        key_prefix: impl Into<String>,
        pool_size: u32,
    ) -> Result<Self, RemoteCacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|e| RemoteCacheError::Connection(e.to_string()))?;
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(2))
            .build_unchecked(manager);

        Ok(Self::new(pool, key_prefix))
    }

    pub fn new(pool: RedisPool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// SCAN glob for keys containing `pattern` as a literal substring.
    fn match_pattern(&self, pattern: &str) -> String {
        format!("{}*{}*", escape_glob(&self.key_prefix), escape_glob(pattern))
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, RemoteCacheError> {
        self.pool.get().await.map_err(|e| match e {
            RunError::User(e) => RemoteCacheError::Connection(e.to_string()),
            RunError::TimedOut => {
                RemoteCacheError::Connection("timed out waiting for a connection".to_string())
            }
        })
    }
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn command_error(e: RedisError) -> RemoteCacheError {
    RemoteCacheError::Command(e.to_string())
}

#[async_trait]
impl RemoteCache for RedisRemoteCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteCacheError> {
        let mut conn = self.connection().await?;
        conn.get(self.key(key)).await.map_err(command_error)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), RemoteCacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(self.key(key), value, seconds)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, RemoteCacheError> {
        let mut conn = self.connection().await?;
        conn.del(self.key(key)).await.map_err(command_error)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, RemoteCacheError> {
        let mut conn = self.connection().await?;
        let matcher = self.match_pattern(pattern);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&matcher)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(command_error)?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(command_error)?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, removed, "Removed matching remote cache keys");
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), RemoteCacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }
}
