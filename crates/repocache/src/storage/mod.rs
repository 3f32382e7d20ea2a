//! Repository implementations.
//!
//! - [`inmemory`]: in-memory repository with soft deletes and relation pivots
//! - [`cached`]: cache-aside decorator over any repository

pub mod cached;
pub mod inmemory;

pub use cached::{CacheOptions, CachedRepository};
pub use inmemory::InMemoryRepository;
