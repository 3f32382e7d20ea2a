//! Redis cache implementation.
//!
//! Values are plain Redis strings. The set primitive used by the tag index
//! maps onto Redis sets (`SADD` / `SMEMBERS`).
//!
//! # Non-Atomicity Safety
//!
//! Flushing a tag through the index issues one `DEL` per key. Every step is
//! idempotent: `DEL` on a missing key is a no-op and `SADD` of an existing
//! member changes nothing. A flush interrupted halfway leaves some keys and
//! the index behind; the next flush of the tag finishes the cleanup.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use repocache_core::cache::{Cache, Result};

use super::error::{map_redis_error, RedisResultExt};

/// Redis cache backend using connection manager for pooling.
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        tracing::debug!(url, "Connected to Redis");
        Ok(Self { conn })
    }
}

/// Whole seconds for `SET EX`, rounding any fraction up. `SET EX` rejects 0.
fn ttl_seconds(ttl: Duration) -> u64 {
    (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
}

#[async_trait]
impl Cache for RedisCache {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.into_cache()
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => conn
                .set_ex::<_, _, ()>(key, value, ttl_seconds(duration))
                .await
                .into_cache(),
            None => conn.set::<_, _, ()>(key, value).await.into_cache(),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.into_cache()
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set_key, member).await.into_cache()
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(set_key).await.into_cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repocache_core::cache::CacheError;
    use std::time::Duration;
    use uuid::Uuid;

    /// Helper to get Redis URL from environment.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        RedisCache::new(&redis_url()).await.ok()
    }

    /// Generate a unique test key to avoid conflicts.
    fn test_key(suffix: &str) -> String {
        format!("test:redis_cache:{}:{}", Uuid::new_v4(), suffix)
    }

    #[test]
    fn test_map_redis_error_classification() {
        let refused = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(map_redis_error(refused).is_unavailable());

        let wrong_type = redis::RedisError::from((redis::ErrorKind::TypeError, "wrong type"));
        assert!(matches!(
            map_redis_error(wrong_type),
            CacheError::OperationFailed(_)
        ));
    }

    #[test]
    fn test_ttl_seconds_rounds_up() {
        assert_eq!(ttl_seconds(Duration::from_millis(1900)), 2);
        assert_eq!(ttl_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(300)), 300);
    }

    #[tokio::test]
    async fn test_redis_kind_has_no_native_tags() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        assert_eq!(cache.kind(), "redis");
        let result = cache.flush_tag("anything").await;
        assert_eq!(
            result,
            Err(CacheError::TagsUnsupported("redis".to_string()))
        );
    }

    #[tokio::test]
    async fn test_redis_set_and_get() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("set_get");
        let value = b"hello world";

        cache.set(&key, value, None).await.unwrap();

        let result = cache.get(&key).await.unwrap();
        assert_eq!(result, Some(value.to_vec()));

        // Clean up
        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_get_nonexistent() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("nonexistent");
        let result = cache.get(&key).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_redis_delete() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("delete");

        cache.set(&key, b"to be deleted", None).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());

        // Deleting again is a no-op
        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("ttl");

        cache
            .set(&key, b"expiring value", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_set_members() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let set_key = test_key("index");

        assert!(cache.set_members(&set_key).await.unwrap().is_empty());

        cache.set_add(&set_key, "a").await.unwrap();
        cache.set_add(&set_key, "b").await.unwrap();
        cache.set_add(&set_key, "a").await.unwrap();

        let mut members = cache.set_members(&set_key).await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        cache.delete(&set_key).await.unwrap();
        assert!(cache.set_members(&set_key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redis_binary_data() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("binary");
        let value: Vec<u8> = (0..=255).collect();

        cache.set(&key, &value, None).await.unwrap();

        let result = cache.get(&key).await.unwrap();
        assert_eq!(result, Some(value));

        // Clean up
        cache.delete(&key).await.unwrap();
    }
}
