//! Query cache configuration.

use std::num::NonZeroUsize;

use super::keys::TtlSource;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_QUERY_CACHE_LIMIT: usize = 128;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve listings from the in-process query cache.
    pub enabled: bool,
    /// Lifetime of a cached listing in seconds.
    pub default_ttl_seconds: u64,
    /// Maximum cached listings across all domains.
    pub query_cache_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            query_cache_limit: DEFAULT_QUERY_CACHE_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_seconds: settings.default_ttl.as_secs(),
            query_cache_limit: settings.query_cache_limit.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the query cache limit as NonZeroUsize, clamping to 1 if zero.
    pub fn query_cache_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.query_cache_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

impl TtlSource for CacheConfig {
    fn default_ttl_seconds(&self) -> u64 {
        self.default_ttl_seconds
    }
}
