// Best-effort key/value cache. Redis in deployments, in-process map otherwise.

use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::CacheConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}

/// Cache key builders shared by the services that read through or invalidate.
pub mod keys {
    use uuid::Uuid;

    pub fn order(id: Uuid) -> String {
        format!("order:{}", id)
    }

    pub fn product(id: Uuid) -> String {
        format!("product:{}", id)
    }

    pub fn coupon(code: &str) -> String {
        format!("coupon:{}", code.to_uppercase())
    }

    pub fn auth_session(jti: &str) -> String {
        format!("auth:session:{}", jti)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

/// In-process cache used in development, tests and as the Redis fallback
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().await;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        self.store.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Redis-backed cache sharing one managed connection
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(client: redis::Client) -> Result<Self, CacheError> {
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl.as_secs().max(1))
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }
}

/// Builds the configured backend, falling back to memory when Redis is unreachable.
pub async fn build_cache(config: &CacheConfig, redis_url: &str) -> Arc<dyn CacheBackend> {
    if config.backend == "redis" {
        let connected = match redis::Client::open(redis_url) {
            Ok(client) => RedisCache::connect(client).await,
            Err(err) => Err(CacheError::Redis(err)),
        };
        match connected {
            Ok(cache) => return Arc::new(cache),
            Err(err) => warn!(error = %err, "Redis cache unavailable, using in-memory cache"),
        }
    }
    Arc::new(InMemoryCache::new())
}

/// Reads and decodes a JSON value. Failures are logged and treated as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheBackend, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cache entry");
                let _ = cache.delete(key).await;
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(key, error = %err, "cache read failed");
            None
        }
    }
}

/// Encodes and stores a JSON value. Failures are logged and ignored.
pub async fn put_json<T: Serialize>(
    cache: &dyn CacheBackend,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!(key, error = %err, "cache encode failed");
            return;
        }
    };
    if let Err(err) = cache.set(key, &encoded, Some(ttl)).await {
        warn!(key, error = %err, "cache write failed");
    }
}

/// Drops a key after a write. Failures are logged and ignored.
pub async fn invalidate(cache: &dyn CacheBackend, key: &str) {
    if let Err(err) = cache.delete(key).await {
        warn!(key, error = %err, "cache invalidation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_invalidate() {
        let cache = InMemoryCache::new();
        put_json(&cache, "n", &vec![1, 2, 3], Duration::from_secs(60)).await;
        let read: Option<Vec<i32>> = get_json(&cache, "n").await;
        assert_eq!(read, Some(vec![1, 2, 3]));

        invalidate(&cache, "n").await;
        let read: Option<Vec<i32>> = get_json(&cache, "n").await;
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn undecodable_entries_are_dropped() {
        let cache = InMemoryCache::new();
        cache.set("bad", "{not json", None).await.unwrap();
        let read: Option<Vec<i32>> = get_json(&cache, "bad").await;
        assert!(read.is_none());
        assert!(!cache.exists("bad").await.unwrap());
    }

    #[test]
    fn coupon_keys_are_case_insensitive() {
        assert_eq!(keys::coupon("gold10"), keys::coupon("GOLD10"));
    }
}
