//! Mapping of Redis failures onto [`CacheError`].

use repocache_core::cache::{CacheError, Result};

/// Classifies a Redis error. Anything that means the server cannot be
/// reached is reported as a connection failure.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_io_error()
    {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}

/// Converts `redis` results into cache results.
pub trait RedisResultExt<T> {
    fn into_cache(self) -> Result<T>;
}

impl<T> RedisResultExt<T> for redis::RedisResult<T> {
    fn into_cache(self) -> Result<T> {
        self.map_err(map_redis_error)
    }
}
