//! Pure functions for serializing/deserializing cached values to/from bytes.
//!
//! Cached values are stored as JSON, which keeps them readable when
//! inspecting a backend by hand.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors that can occur during cache serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to serialize a value to bytes.
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to deserialize bytes to a value.
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

/// Serializes any value to JSON bytes.
pub fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(value).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes JSON bytes back into a value.
pub fn deserialize_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: u64,
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_roundtrip_struct_list() {
        let posts = vec![
            Post {
                id: 1,
                title: "Hello".to_string(),
                tags: vec!["intro".to_string()],
            },
            Post {
                id: 2,
                title: "World".to_string(),
                tags: vec![],
            },
        ];

        let bytes = serialize_value(&posts).expect("serialize should succeed");
        let decoded: Vec<Post> = deserialize_value(&bytes).expect("deserialize should succeed");

        assert_eq!(posts, decoded);
    }

    #[test]
    fn test_scalars_are_stored_as_plain_json() {
        assert_eq!(serialize_value(&42u64).unwrap(), b"42");
        assert_eq!(serialize_value(&true).unwrap(), b"true");
        assert_eq!(serialize_value(&Option::<u64>::None).unwrap(), b"null");
    }

    #[test]
    fn test_deserialize_malformed_bytes() {
        let result: Result<Post, _> = deserialize_value(b"not valid json");
        assert!(matches!(result, Err(SerializationError::DeserializeFailed(_))));
    }

    #[test]
    fn test_deserialize_wrong_shape() {
        let result: Result<Vec<Post>, _> = deserialize_value(b"{\"id\": 1}");
        assert!(matches!(result, Err(SerializationError::DeserializeFailed(_))));
    }
}
