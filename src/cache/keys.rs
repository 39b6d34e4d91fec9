//! Cache key derivation.
//!
//! Every cached listing belongs to a [`CacheDomain`]. The stored key embeds
//! the domain template on both sides of its SHA-256 digest, so keys stay
//! greppable in the backing store while the digest keeps domains apart.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use sha2::{Digest, Sha256};

/// Closed set of cacheable result families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    OrderInvoiceList,
    RoleList,
    UserList,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 3] = [
        CacheDomain::OrderInvoiceList,
        CacheDomain::RoleList,
        CacheDomain::UserList,
    ];

    pub fn template(self) -> &'static str {
        match self {
            CacheDomain::OrderInvoiceList => "order:invoice:get:list",
            CacheDomain::RoleList => "role:get:list",
            CacheDomain::UserList => "user:get:list",
        }
    }
}

impl Display for CacheDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.template())
    }
}

/// Supplies the default entry lifetime. Read on every derivation.
pub trait TtlSource {
    fn default_ttl_seconds(&self) -> u64;
}

/// Derived key and lifetime for one cache domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeyRecord {
    pub cache_key: String,
    pub ttl: u64,
}

impl CacheKeyRecord {
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

/// Build `template:sha256(template):template` and attach the configured TTL.
pub fn derive_cache_key(domain: CacheDomain, ttl: &impl TtlSource) -> CacheKeyRecord {
    let template = domain.template();
    let digest = template_digest(template);
    CacheKeyRecord {
        cache_key: format!("{template}:{digest}:{template}"),
        ttl: ttl.default_ttl_seconds(),
    }
}

/// Lowercase hex SHA-256 of `template`.
pub fn template_digest(template: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
