//! In-process cache of projected listing pages.
//!
//! Entries are keyed by the derived domain key plus a fingerprint of the
//! listing arguments and expire after the TTL carried by the key record.

use std::sync::Mutex;
use std::time::Instant;

use lru::LruCache;
use metrics::counter;

use crate::application::projection::Projected;
use crate::application::query::{QueryArgs, QueryResult};

use super::config::CacheConfig;
use super::keys::{CacheKeyRecord, hash_value};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_QUERY_CACHE_HIT: &str = "tenancy_query_cache_hit_total";
pub(crate) const METRIC_QUERY_CACHE_MISS: &str = "tenancy_query_cache_miss_total";
pub(crate) const METRIC_QUERY_CACHE_EVICT: &str = "tenancy_query_cache_evict_total";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    cache_key: String,
    args_hash: u64,
}

struct Entry {
    result: QueryResult<Projected>,
    expires_at: Instant,
}

pub struct QueryCache {
    entries: Mutex<LruCache<EntryKey, Entry>>,
}

impl QueryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.query_cache_limit_non_zero())),
        }
    }

    pub fn get(&self, record: &CacheKeyRecord, args: &QueryArgs) -> Option<QueryResult<Projected>> {
        let key = entry_key(record, args);
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");

        let fresh = match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.result.clone()),
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        };

        match fresh {
            Some(_) => counter!(METRIC_QUERY_CACHE_HIT).increment(1),
            None => counter!(METRIC_QUERY_CACHE_MISS).increment(1),
        }
        fresh
    }

    pub fn put(&self, record: &CacheKeyRecord, args: &QueryArgs, result: QueryResult<Projected>) {
        let entry = Entry {
            result,
            expires_at: Instant::now() + record.ttl_duration(),
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "put").push(entry_key(record, args), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key.cache_key != record.cache_key || evicted_key.args_hash != hash_value(args) {
                counter!(METRIC_QUERY_CACHE_EVICT).increment(1);
            }
        }
    }

    /// Drop every cached page of the domain identified by `record`.
    pub fn invalidate(&self, record: &CacheKeyRecord) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate");
        let stale: Vec<EntryKey> = entries
            .iter()
            .filter(|(key, _)| key.cache_key == record.cache_key)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_key(record: &CacheKeyRecord, args: &QueryArgs) -> EntryKey {
    EntryKey {
        cache_key: record.cache_key.clone(),
        args_hash: hash_value(args),
    }
}
