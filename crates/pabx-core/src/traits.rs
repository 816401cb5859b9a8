//! Common traits for service collaborators
//!
//! Defines the abstraction over the shared key/value store the consolidator
//! publishes into.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Cache service trait
///
/// Values are stored as JSON. Every entry written through `set` carries its
/// own time-to-live.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// List keys matching a glob pattern (e.g. `active-calls:*`)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError>;
}
