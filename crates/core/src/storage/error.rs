use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
