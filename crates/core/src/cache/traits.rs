use std::time::Duration;

use async_trait::async_trait;

use super::{CacheError, Result};

/// Trait for key-value cache backends.
///
/// Every backend provides plain get/set/delete plus a durable set primitive
/// used to emulate tag groups. Backends with native tag groups override
/// [`Cache::set_tagged`] and [`Cache::flush_tag`].
#[async_trait]
pub trait Cache: Send + Sync {
    /// Backend kind, matched against the tag-capable allow-list.
    fn kind(&self) -> &'static str;

    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key. Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Adds `member` to the set stored at `set_key`. Sets never expire.
    async fn set_add(&self, set_key: &str, member: &str) -> Result<()>;

    /// Returns every member of the set stored at `set_key`.
    async fn set_members(&self, set_key: &str) -> Result<Vec<String>>;

    /// Sets a value and records it under `tag` in one step.
    async fn set_tagged(
        &self,
        _tag: &str,
        _key: &str,
        _value: &[u8],
        _ttl: Option<Duration>,
    ) -> Result<()> {
        Err(CacheError::TagsUnsupported(self.kind().to_string()))
    }

    /// Evicts every value recorded under `tag`.
    async fn flush_tag(&self, _tag: &str) -> Result<()> {
        Err(CacheError::TagsUnsupported(self.kind().to_string()))
    }
}
