//! In-memory cache backend implementation.
//!
//! Provides a thread-safe in-memory cache with TTL support and native tag
//! groups for single-instance deployments.

mod cache;

pub use cache::MemoryCache;
