mod error;
mod keys;
mod serialization;
mod service;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    derive_key, short_type_name, tag_index_key, tag_of_key, type_tag, KeyArgs, KeyPart,
    TAG_DELIMITER,
};
pub use serialization::{deserialize_value, serialize_value, SerializationError};
pub use service::{CacheService, CacheSettings};
pub use traits::Cache;
