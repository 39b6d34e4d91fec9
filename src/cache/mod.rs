//! Listing cache.
//!
//! Derives stable keys for the closed set of cacheable domains and keeps
//! projected listing pages in an in-process LRU until their TTL lapses.
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 300
//! query_cache_limit = 128
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::{
    CacheDomain, CacheKeyRecord, TtlSource, derive_cache_key, hash_value, template_digest,
};
pub(crate) use store::{METRIC_QUERY_CACHE_EVICT, METRIC_QUERY_CACHE_HIT, METRIC_QUERY_CACHE_MISS};
pub use store::QueryCache;
