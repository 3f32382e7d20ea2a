//! Cached repository decorator.
//!
//! [`CachedRepository`] wraps any repository with the cache-aside pattern:
//!
//! - **Reads**: Check cache first, on miss fetch from repository and populate cache
//! - **Writes**: Persist to repository, then flush every entry under the decorator's tag
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let cache = Arc::new(CacheService::new(Arc::new(MemoryCache::new(10_000)), settings));
//! let users = CachedRepository::new(InMemoryRepository::<User>::new(), cache.clone());
//!
//! users.count(&[]).await?; // miss: queries the repository
//! users.count(&[]).await?; // hit
//! ```

mod repository;

pub use repository::{CacheOptions, CachedRepository};
