//! Cache-aside decorator for repositories.
//!
//! The pure pieces (key derivation, the cache adapter, the repository
//! contract) live in `repocache_core`. This crate provides the cache
//! backends, an in-memory repository, the caching decorator and the
//! configuration used by the `repocache` binary.

pub mod cache;
pub mod config;
pub mod models;
pub mod storage;
