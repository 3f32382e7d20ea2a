//! Redis cache backend implementation.
//!
//! Provides a distributed cache using Redis for multi-instance deployments.
//! Redis has no native tag groups, so tags are emulated through Redis sets.

mod cache;
mod error;

pub use cache::RedisCache;
