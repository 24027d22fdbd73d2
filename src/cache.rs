//! Bounded, TTL'd in-memory caches with eviction callbacks.
//!
//! Two caches are owned by each orchestrator: `search-results`, which holds
//! paginated result pages keyed by a canonical serialisation of the search
//! options, and `index`, which holds remote index snapshots fetched by the
//! GitHub and collection sources. Both are [`moka`] caches bounded by entry
//! count, estimated byte size and time-to-live.
//!
//! moka enforces a single weighted capacity, so both bounds are folded into
//! it: capacity is the byte budget, and each entry weighs at least
//! `ceil(max_bytes / max_entries)`. That keeps the total estimated size
//! under `max_bytes` and the entry count under `max_entries`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;
use moka::notification::RemovalCause;
use serde::Serialize;

use crate::config::CacheLimits;
use crate::options::UnifiedSearchOptions;
use crate::provider::{CollectionIndexSnapshot, GitHubIndexSnapshot};
use crate::types::UnifiedSearchResult;

/// Name of the cache holding paginated search results.
pub const SEARCH_RESULTS_CACHE: &str = "search-results";

/// Name of the cache holding remote index snapshots.
pub const INDEX_CACHE: &str = "index";

/// Values that can report their approximate memory footprint.
pub trait EstimateSize {
    fn estimated_bytes(&self) -> usize;
}

impl EstimateSize for Vec<UnifiedSearchResult> {
    fn estimated_bytes(&self) -> usize {
        self.iter()
            .map(UnifiedSearchResult::estimated_bytes)
            .sum::<usize>()
            + std::mem::size_of::<Self>()
    }
}

/// A remote index snapshot held in the `index` cache.
#[derive(Debug, Clone)]
pub enum CachedIndex {
    GitHub(Arc<GitHubIndexSnapshot>),
    Collection(Arc<CollectionIndexSnapshot>),
}

impl EstimateSize for CachedIndex {
    fn estimated_bytes(&self) -> usize {
        match self {
            Self::GitHub(snapshot) => snapshot.estimated_bytes(),
            Self::Collection(snapshot) => snapshot.estimated_bytes(),
        }
    }
}

/// Why an entry left a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The entry outlived its TTL.
    Expired,
    /// The entry was removed by `clear` or an invalidation.
    Explicit,
    /// The entry was overwritten by a newer value for the same key.
    Replaced,
    /// The entry was pushed out by count or size pressure.
    Capacity,
}

impl From<RemovalCause> for EvictionReason {
    fn from(cause: RemovalCause) -> Self {
        match cause {
            RemovalCause::Expired => Self::Expired,
            RemovalCause::Explicit => Self::Explicit,
            RemovalCause::Replaced => Self::Replaced,
            RemovalCause::Size => Self::Capacity,
        }
    }
}

/// Observer invoked with `(cache name, key, reason)` whenever an entry leaves a cache.
pub type EvictionCallback = Arc<dyn Fn(&str, &str, EvictionReason) + Send + Sync>;

/// The default eviction observer: logs at debug level.
pub fn log_eviction() -> EvictionCallback {
    Arc::new(|cache, key, reason| {
        tracing::debug!(cache, key, ?reason, "cache entry evicted");
    })
}

/// Point-in-time statistics for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed by expiry or capacity pressure (not explicit clears).
    pub evictions: u64,
    pub entries: u64,
    /// Total weight currently held, in bytes.
    pub weighted_bytes: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// A named, bounded cache keyed by canonical strings.
pub struct BoundedCache<V> {
    name: &'static str,
    inner: Cache<String, V>,
    limits: CacheLimits,
    counters: Arc<Counters>,
}

impl<V> BoundedCache<V>
where
    V: EstimateSize + Clone + Send + Sync + 'static,
{
    /// Create a cache with the given limits and eviction observer.
    pub fn new(name: &'static str, limits: CacheLimits, on_evict: EvictionCallback) -> Self {
        let counters = Arc::new(Counters::default());
        let min_weight = min_entry_weight(&limits);
        let listener_counters = Arc::clone(&counters);

        let inner = Cache::builder()
            .name(name)
            .max_capacity(limits.max_bytes)
            .weigher(move |_key: &String, value: &V| entry_weight(value, min_weight))
            .time_to_live(limits.ttl())
            .eviction_listener(move |key: Arc<String>, _value: V, cause: RemovalCause| {
                if cause.was_evicted() {
                    listener_counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                on_evict(name, key.as_str(), cause.into());
            })
            .build();

        Self {
            name,
            inner,
            limits,
            counters,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up `key`, counting the hit or miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let value = self.inner.get(key).await;
        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Insert `value` under `key`.
    ///
    /// Returns `false` without caching when the value alone would exceed the
    /// cache's byte budget.
    pub async fn insert(&self, key: String, value: V) -> bool {
        let bytes = value.estimated_bytes() as u64;
        if bytes > self.limits.max_bytes {
            tracing::debug!(
                cache = self.name,
                bytes,
                max_bytes = self.limits.max_bytes,
                "value too large to cache"
            );
            return false;
        }
        self.inner.insert(key, value).await;
        true
    }

    /// Remove a single entry.
    pub async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Remove every entry, notifying the eviction observer for each.
    pub async fn clear(&self) {
        let keys: Vec<Arc<String>> = self.inner.iter().map(|(key, _)| key).collect();
        for key in keys {
            self.inner.invalidate(key.as_str()).await;
        }
        // Entries inserted after the snapshot above.
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    /// Purge expired entries and apply pending capacity evictions.
    pub async fn cleanup(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
            weighted_bytes: self.inner.weighted_size(),
        }
    }
}

impl<V> std::fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn min_entry_weight(limits: &CacheLimits) -> u64 {
    limits.max_bytes.div_ceil(limits.max_entries.max(1))
}

fn entry_weight<V: EstimateSize>(value: &V, min_weight: u64) -> u32 {
    let weight = (value.estimated_bytes() as u64).max(min_weight);
    u32::try_from(weight).unwrap_or(u32::MAX)
}

/// Every option that changes which results a call returns, in a fixed order.
///
/// Serialised to JSON this is the canonical cache key. Streaming options are
/// absent because streaming bypasses the results cache.
#[derive(Serialize)]
struct SearchCacheKey<'a> {
    query: String,
    include_local: bool,
    include_github: bool,
    include_collection: bool,
    element_type: Option<&'a str>,
    page: usize,
    page_size: usize,
    sort_by: crate::types::SortBy,
    max_results: Option<usize>,
    include_all: bool,
    preferred_source: Option<crate::types::Source>,
    source_priority: Option<&'a [crate::types::Source]>,
}

/// Build the canonical results-cache key for a normalised query and options.
///
/// The query is lowercased so that case variants share an entry; pagination
/// is recorded after defaulting so `page: None` and `page: Some(1)` agree.
pub fn search_cache_key(normalized_query: &str, options: &UnifiedSearchOptions) -> String {
    let key = SearchCacheKey {
        query: normalized_query.to_lowercase(),
        include_local: options.include_local,
        include_github: options.include_github,
        include_collection: options.include_collection,
        element_type: options.element_type.as_ref().map(|t| t.as_str()),
        page: options.effective_page(),
        page_size: options.effective_page_size(),
        sort_by: options.sort_by,
        max_results: options.max_results,
        include_all: options.include_all,
        preferred_source: options.preferred_source,
        source_priority: options.source_priority.as_deref(),
    };
    serde_json::to_string(&key).unwrap_or_else(|_| format!("{normalized_query:?}"))
}

/// The pair of caches owned by one orchestrator.
#[derive(Debug)]
pub struct SearchCaches {
    pub results: BoundedCache<Vec<UnifiedSearchResult>>,
    pub index: Arc<BoundedCache<CachedIndex>>,
}

impl SearchCaches {
    pub fn new(results: CacheLimits, index: CacheLimits, on_evict: EvictionCallback) -> Self {
        Self {
            results: BoundedCache::new(SEARCH_RESULTS_CACHE, results, Arc::clone(&on_evict)),
            index: Arc::new(BoundedCache::new(INDEX_CACHE, index, on_evict)),
        }
    }

    pub async fn clear(&self) {
        self.results.clear().await;
        self.index.clear().await;
    }

    pub async fn cleanup(&self) {
        self.results.cleanup().await;
        self.index.cleanup().await;
    }
}
