//! Runtime choice between the Redis and in-process caches

use crate::{MemoryCache, RedisCache};
use async_trait::async_trait;
use pabx_core::error::AppError;
use pabx_core::traits::CacheService;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

/// Either cache, picked at startup from configuration
#[derive(Clone)]
pub enum CacheBackend {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl CacheBackend {
    /// Redis when a URL is configured, the in-process cache otherwise
    ///
    /// A configured but unreachable Redis is an error: other services read
    /// the published calls from Redis, so publishing anywhere else would go
    /// unseen.
    pub async fn from_url(url: Option<&str>) -> Result<Self, AppError> {
        let Some(url) = url else {
            info!("No Redis URL configured, using in-process cache");
            return Ok(CacheBackend::Memory(MemoryCache::new()));
        };

        let cache = RedisCache::new(url).await?;
        info!("✅ Connected to Redis");
        Ok(CacheBackend::Redis(cache))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheBackend::Redis(_) => "redis",
            CacheBackend::Memory(_) => "memory",
        }
    }
}

#[async_trait]
impl CacheService for CacheBackend {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self {
            CacheBackend::Redis(cache) => cache.get(key).await,
            CacheBackend::Memory(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        match self {
            CacheBackend::Redis(cache) => cache.set(key, value, ttl_secs).await,
            CacheBackend::Memory(cache) => cache.set(key, value, ttl_secs).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        match self {
            CacheBackend::Redis(cache) => cache.delete(key).await,
            CacheBackend::Memory(cache) => cache.delete(key).await,
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        match self {
            CacheBackend::Redis(cache) => cache.keys(pattern).await,
            CacheBackend::Memory(cache) => cache.keys(pattern).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_url_uses_memory() {
        let cache = CacheBackend::from_url(None).await.unwrap();
        assert_eq!(cache.name(), "memory");

        cache.set("active-calls:U1", &vec![1, 2], 5).await.unwrap();
        let value: Option<Vec<i32>> = cache.get("active-calls:U1").await.unwrap();
        assert_eq!(value, Some(vec![1, 2]));
        assert_eq!(cache.keys("active-calls:*").await.unwrap(), vec!["active-calls:U1"]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let result = CacheBackend::from_url(Some("not-a-redis-url")).await;
        assert!(matches!(result, Err(AppError::CacheConnection(_))));
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_an_error() {
        // Bind then release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("redis://127.0.0.1:{}", port);

        let result = CacheBackend::from_url(Some(&url)).await;
        assert!(matches!(result, Err(AppError::CacheConnection(_))));
    }
}
