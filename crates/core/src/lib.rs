//! Core types and pure logic for repocache.
//!
//! - [`cache`]: the cache backend contract, cache key derivation and the
//!   [`cache::CacheService`] adapter with its tag index fallback.
//! - [`storage`]: the [`storage::Repository`] contract, query types and the
//!   pure condition evaluation used by repository implementations.

pub mod cache;
pub mod storage;
