use std::{env, time::Duration};

use repocache_core::cache::CacheSettings;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Prefix prepended to every cache key (default: "repocache:")
    pub cache_prefix: String,
    /// Backend kinds with native tag groups (default: ["memory"])
    pub cache_tag_backends: Vec<String>,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_PREFIX` - Cache key prefix (default: "repocache:")
    /// - `CACHE_TAG_BACKENDS` - Comma-separated tag-capable backends (default: "memory")
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cache_ttl_seconds: lookup("CACHE_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            cache_prefix: lookup("CACHE_PREFIX").unwrap_or_else(|| "repocache:".to_string()),
            cache_tag_backends: lookup("CACHE_TAG_BACKENDS")
                .map(|v| parse_list(&v))
                .unwrap_or_else(|| vec!["memory".to_string()]),
            cache_max_entries: lookup("CACHE_MAX_ENTRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Settings for the process-wide cache service.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            default_ttl: self.cache_ttl(),
            key_prefix: self.cache_prefix.clone(),
            tag_supported_backends: self.cache_tag_backends.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_cache_ttl_conversion() {
        let config = config_from(&[("CACHE_TTL_SECONDS", "600")]);
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);

        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.cache_prefix, "repocache:");
        assert_eq!(config.cache_tag_backends, vec!["memory".to_string()]);
        assert_eq!(config.cache_max_entries, 10_000);
        assert_eq!(config.redis_url, "redis://localhost:6379");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("CACHE_TTL_SECONDS", "soon"), ("CACHE_MAX_ENTRIES", "-1")]);

        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.cache_max_entries, 10_000);
    }

    #[test]
    fn test_tag_backends_list() {
        let config = config_from(&[("CACHE_TAG_BACKENDS", " memory, redis ,,")]);
        assert_eq!(
            config.cache_tag_backends,
            vec!["memory".to_string(), "redis".to_string()]
        );

        // An empty list disables native tags everywhere
        let config = config_from(&[("CACHE_TAG_BACKENDS", "")]);
        assert!(config.cache_tag_backends.is_empty());
    }

    #[test]
    fn test_cache_settings() {
        let config = config_from(&[("CACHE_PREFIX", "app:"), ("CACHE_TTL_SECONDS", "30")]);
        let settings = config.cache_settings();

        assert_eq!(settings.key_prefix, "app:");
        assert_eq!(settings.default_ttl, Duration::from_secs(30));
        assert_eq!(settings.tag_supported_backends, vec!["memory".to_string()]);
    }
}
