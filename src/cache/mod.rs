//! In-process cache
//!
//! Hot lookups (course membership, unread notification counts) are kept in a
//! moka cache. Values are stored as JSON so any serialisable type can be
//! cached, and keys can be invalidated in bulk with glob patterns.
//!
//! ```rust,ignore
//! use coursehub::cache::{create_cache, CacheLayer};
//! use coursehub::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("course:1:member:2", &true, Duration::from_secs(60)).await?;
//! cache.delete_pattern("course:1:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache operations used by the services.
///
/// The methods are generic, so the trait is not object safe. Services hold an
/// `Arc<MemoryCache>` and call through this trait.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Build the shared cache from configuration.
///
/// `ttl_seconds` caps the lifetime of every entry; shorter per-entry TTLs
/// passed to [`CacheLayer::set`] are honoured.
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}

/// Key builders, so that writers and invalidators agree on the layout.
pub mod keys {
    /// Enrollment role of a user in a course (`Option<EnrollmentRole>`)
    pub fn course_member(course_id: i64, user_id: i64) -> String {
        format!("course:{}:member:{}", course_id, user_id)
    }

    /// Everything cached for one course
    pub fn course_pattern(course_id: i64) -> String {
        format!("course:{}:*", course_id)
    }

    pub fn unread_notifications(user_id: i64) -> String {
        format!("notifications:unread:{}", user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_default_config() {
        let cache = create_cache(&CacheConfig::default());

        cache.set("test_key", &"test_value".to_string(), Duration::from_secs(60)).await.unwrap();
        let result: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(result, Some("test_value".to_string()));
    }

    #[tokio::test]
    async fn test_create_cache_with_zero_ttl_still_usable() {
        let config = CacheConfig {
            ttl_seconds: 0,
            max_capacity: 100,
        };
        let cache = create_cache(&config);

        cache.set("key", &42i64, Duration::from_secs(60)).await.unwrap();
        let result: Option<i64> = cache.get("key").await.unwrap();
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_course_pattern_matches_member_keys() {
        let cache = create_cache(&CacheConfig::default());
        let ttl = Duration::from_secs(60);

        cache.set(&keys::course_member(1, 2), &true, ttl).await.unwrap();
        cache.set(&keys::course_member(1, 3), &true, ttl).await.unwrap();
        cache.set(&keys::course_member(10, 2), &true, ttl).await.unwrap();

        cache.delete_pattern(&keys::course_pattern(1)).await.unwrap();

        let a: Option<bool> = cache.get(&keys::course_member(1, 2)).await.unwrap();
        let b: Option<bool> = cache.get(&keys::course_member(1, 3)).await.unwrap();
        let c: Option<bool> = cache.get(&keys::course_member(10, 2)).await.unwrap();
        assert_eq!(a, None);
        assert_eq!(b, None);
        assert_eq!(c, Some(true));
    }
}
