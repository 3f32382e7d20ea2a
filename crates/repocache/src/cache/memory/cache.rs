//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using
//! tokio synchronization primitives and LRU eviction policy.
//!
//! Besides plain entries the cache keeps two kinds of durable sets, neither
//! subject to eviction:
//! - Tag groups: keys written through [`Cache::set_tagged`], flushed as a
//!   unit by [`Cache::flush_tag`]
//! - Plain sets: the set primitive backing the tag index on backends without
//!   native tags
//!
//! All three live behind one lock, so a tagged write and a tag flush are
//! atomic with respect to readers. A tag group that grows past the store's
//! capacity drops members that were evicted or have expired.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use repocache_core::cache::{Cache, Result};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Creates a new cache entry with optional TTL.
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    /// Returns true if this entry has expired.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

#[derive(Debug)]
struct State {
    /// Main key-value store with LRU eviction.
    store: LruCache<String, CacheEntry>,
    /// Tag -> keys written under it.
    tags: HashMap<String, HashSet<String>>,
    /// Set key -> members.
    sets: HashMap<String, HashSet<String>>,
}

/// In-memory cache implementation with LRU eviction and native tag groups.
///
/// Entries expire lazily: an expired entry is dropped the next time it is
/// read. Tag groups may reference keys that were since evicted or expired
/// until they are pruned; flushing them is a no-op for those keys.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    state: Arc<RwLock<State>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache with LRU eviction.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of entries before LRU eviction kicks in.
    ///   A value of 0 is treated as 1.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(RwLock::new(State {
                store: LruCache::new(capacity),
                tags: HashMap::new(),
                sets: HashMap::new(),
            })),
        }
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.store.len()
    }

    /// Returns true when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Write lock: LRU reads update recency.
        let mut state = self.state.write().await;

        match state.store.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        state.store.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .store
            .put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.store.pop(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .sets
            .get(set_key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_tagged(
        &self,
        tag: &str,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let State { store, tags, .. } = &mut *state;
        store.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));

        let group = tags.entry(tag.to_string()).or_default();
        group.insert(key.to_string());
        // A group can only outgrow the store by holding evicted or expired keys.
        if group.len() > store.cap().get() {
            group.retain(|member| {
                store
                    .peek(member)
                    .is_some_and(|entry| !entry.is_expired())
            });
        }
        Ok(())
    }

    async fn flush_tag(&self, tag: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let keys = state.tags.remove(tag).unwrap_or_default();
        for key in &keys {
            state.store.pop(key);
        }
        tracing::trace!(tag, evicted = keys.len(), "Flushed memory tag group");
        Ok(())
    }
}
