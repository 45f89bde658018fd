//! Response cache contract, an in-memory implementation and key generation.

use crate::request::{SearchRequest, SearchScope};
use async_trait::async_trait;
use cotiza_core::CountryCode;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key/value store for serialized search responses.
///
/// Implementations swallow their own failures; a broken cache behaves as
/// an empty one.
#[async_trait]
pub trait SearchCache: Send + Sync {
    /// Get a value, `None` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value. `ttl` overrides the cache's default lifetime.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>);

    /// Remove a value.
    async fn del(&self, key: &str);
}

/// Process-local cache with per-entry expiry.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    /// Cache whose entries live for `default_ttl` unless `set` says otherwise.
    /// `None` keeps entries until removed.
    #[must_use]
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("acquire read lock on cache").len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().expect("acquire read lock on cache");
            let Some((value, expires_at)) = entries.get(key) else {
                debug!(key, "cache miss");
                return None;
            };
            if expires_at.map_or(true, |at| Instant::now() < at) {
                debug!(key, "cache hit");
                return Some(value.clone());
            }
        }

        self.entries
            .write()
            .expect("acquire write lock on cache")
            .remove(key);
        debug!(key, "cache entry expired");
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .expect("acquire write lock on cache")
            .insert(key.to_string(), (value, expires_at));
        debug!(key, ttl_secs = ttl.or(self.default_ttl).map(|t| t.as_secs()), "cached value");
    }

    async fn del(&self, key: &str) {
        self.entries
            .write()
            .expect("acquire write lock on cache")
            .remove(key);
    }
}

/// Cache key for a search.
///
/// `search:{product}:{COUNTRY}:{max}` with a default max of 10, or
/// `search:{product}:global:{max}` with a default of 20 when no country is
/// given. The product is lowercased with whitespace runs replaced by `_`.
#[must_use]
pub fn search_cache_key(product: &str, country: Option<&str>, max_results: Option<usize>) -> String {
    let product = product
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    match country {
        Some(country) => format!(
            "search:{product}:{}:{}",
            country.to_uppercase(),
            max_results.unwrap_or(10)
        ),
        None => format!("search:{product}:global:{}", max_results.unwrap_or(20)),
    }
}

/// Cache key for a resolved request.
///
/// Extends [`search_cache_key`] so that requests returning different
/// results never share a key: an explicit country list is appended to
/// global keys, and `:official` / `:alternatives` mark those flags.
#[must_use]
pub fn request_cache_key(request: &SearchRequest, scope: &SearchScope, max_results: usize) -> String {
    let mut key = match scope {
        SearchScope::Country(country) => {
            search_cache_key(&request.product, Some(country.as_str()), Some(max_results))
        }
        SearchScope::Global(countries) => {
            let base = search_cache_key(&request.product, None, Some(max_results));
            if countries.is_empty() || countries.iter().any(CountryCode::is_all) {
                base
            } else {
                let mut codes: Vec<&str> = countries.iter().map(CountryCode::as_str).collect();
                codes.sort_unstable();
                codes.dedup();
                format!("{base}:{}", codes.join(","))
            }
        }
    };

    if request.official_only {
        key.push_str(":official");
    }
    if request.alternatives {
        key.push_str(":alternatives");
    }
    key
}

/// Cache key for a source listing query, `sources:{kind}:{k:v_k:v}` with
/// parameters sorted by name.
#[must_use]
pub fn source_cache_key(kind: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return format!("sources:{kind}");
    }

    let mut params = params.to_vec();
    params.sort_unstable();
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("_");
    format!("sources:{kind}:{joined}")
}
