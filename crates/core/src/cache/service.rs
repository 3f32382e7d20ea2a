//! Cache backend adapter.
//!
//! [`CacheService`] layers read-through memoization and tag groups on top of
//! any [`Cache`] backend. Backends listed as tag-capable get native tagged
//! writes and flushes. Every other backend gets an emulated tag index: a
//! durable set per tag holding every full key written under it.
//!
//! # Consistency
//!
//! - The key is added to the tag index *before* the entry is written. If the
//!   write then fails, the index references a key that was never stored.
//!   Flushing deletes missing keys as a no-op, so the stale member is harmless
//!   and disappears with the next flush of the tag.
//! - Flushing through the index deletes keys one at a time. A concurrent
//!   reader can observe a partially flushed tag.
//! - Two concurrent misses on the same key both compute and both write; the
//!   last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use super::{
    deserialize_value, serialize_value, tag_index_key, tag_of_key, Cache, CacheError, Result,
};

/// Process-wide cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// TTL used when a caller does not supply one.
    pub default_ttl: Duration,
    /// Namespace prepended to every key written to the backend.
    pub key_prefix: String,
    /// Backend kinds treated as supporting native tag groups.
    pub tag_supported_backends: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            key_prefix: String::new(),
            tag_supported_backends: vec!["memory".to_string()],
        }
    }
}

/// Shared cache adapter used by every cached repository in the process.
pub struct CacheService {
    store: Arc<dyn Cache>,
    settings: CacheSettings,
    supports_tags: bool,
}

impl CacheService {
    /// Creates the adapter. Tag support is decided here, once.
    pub fn new(store: Arc<dyn Cache>, settings: CacheSettings) -> Self {
        let supports_tags = settings
            .tag_supported_backends
            .iter()
            .any(|kind| kind == store.kind());

        tracing::debug!(
            backend = store.kind(),
            supports_tags,
            prefix = %settings.key_prefix,
            default_ttl_secs = settings.default_ttl.as_secs(),
            "Cache service initialised"
        );

        Self {
            store,
            settings,
            supports_tags,
        }
    }

    /// Returns the process-wide default TTL.
    pub fn default_ttl(&self) -> Duration {
        self.settings.default_ttl
    }

    /// Returns the key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.settings.key_prefix
    }

    /// Returns true when the backend groups tags natively.
    pub fn supports_tags(&self) -> bool {
        self.supports_tags
    }

    /// Returns the backend kind.
    pub fn backend(&self) -> &'static str {
        self.store.kind()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.settings.key_prefix, key)
    }

    /// Returns the value stored under `key`, computing and storing it on a miss.
    ///
    /// The tag is the part of `key` before the first delimiter. A failed
    /// computation stores nothing. Backend failures propagate; the computed
    /// value is only returned once it has been written.
    pub async fn remember<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let full_key = self.full_key(key);

        if let Some(bytes) = self.store.get(&full_key).await? {
            match deserialize_value::<T>(&bytes) {
                Ok(value) => {
                    tracing::trace!(key, "Cache hit");
                    return Ok(value);
                }
                // Treat as a miss; the fresh value overwrites it below.
                Err(err) => tracing::warn!(key, error = %err, "Cached value could not be decoded"),
            }
        }

        tracing::trace!(key, "Cache miss");
        let value = compute().await?;

        let bytes = serialize_value(&value).map_err(CacheError::from)?;
        let ttl = ttl.unwrap_or(self.settings.default_ttl);
        self.put(key, &full_key, &bytes, ttl).await?;

        Ok(value)
    }

    async fn put(&self, key: &str, full_key: &str, bytes: &[u8], ttl: Duration) -> Result<()> {
        match tag_of_key(key) {
            Some(tag) if self.supports_tags => {
                let tag = self.full_key(tag);
                self.store.set_tagged(&tag, full_key, bytes, Some(ttl)).await
            }
            Some(tag) => {
                let index = tag_index_key(&self.settings.key_prefix, tag);
                self.store.set_add(&index, full_key).await?;
                self.store.set(full_key, bytes, Some(ttl)).await
            }
            None => self.store.set(full_key, bytes, Some(ttl)).await,
        }
    }

    /// Evicts a single entry. Missing keys are ignored.
    pub async fn forget(&self, key: &str) -> Result<()> {
        self.store.delete(&self.full_key(key)).await
    }

    /// Evicts every entry written under `tag`.
    pub async fn flush_tag(&self, tag: &str) -> Result<()> {
        if self.supports_tags {
            self.store.flush_tag(&self.full_key(tag)).await?;
            tracing::debug!(tag, "Flushed tag");
            return Ok(());
        }

        let index = tag_index_key(&self.settings.key_prefix, tag);
        let keys = self.store.set_members(&index).await?;
        for key in &keys {
            self.store.delete(key).await?;
        }
        self.store.delete(&index).await?;

        tracing::debug!(tag, evicted = keys.len(), "Flushed tag through index");
        Ok(())
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.store.kind())
            .field("settings", &self.settings)
            .field("supports_tags", &self.supports_tags)
            .finish()
    }
}
