//! In-memory storage backend.
//!
//! This module provides a complete in-memory implementation of the
//! [`Repository`] trait. Records are kept as JSON rows behind an
//! `Arc<RwLock<_>>`, with soft deletes and relation pivots. It backs the demo
//! command and the cached repository tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use repocache::models::User;
//! use repocache::storage::inmemory::InMemoryRepository;
//!
//! let repo = InMemoryRepository::<User>::new().with_relations(&["roles"]);
//! ```
//!
//! [`Repository`]: repocache_core::storage::Repository

mod repository;

pub use repository::InMemoryRepository;
