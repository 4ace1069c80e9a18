//! L1 in-memory cache using moka.
//!
//! TinyLFU admission, count-bounded, short TTL. Sub-microsecond lookups.

use std::time::Duration;

use moka::sync::Cache;

/// L1 in-memory embedding cache. Keys are `collection:fingerprint`.
pub struct L1MemoryCache {
    cache: Cache<String, Vec<f32>>,
}

impl L1MemoryCache {
    pub fn new(max_entries: u64, ttl_ms: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_millis(ttl_ms))
            .support_invalidation_closures()
            .build();
        Self { cache }
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, embedding: Vec<f32>) {
        self.cache.insert(key, embedding);
    }

    /// Invalidate every key with the given prefix (collection scope).
    pub fn invalidate_prefix(&self, prefix: &str) {
        let owned = prefix.to_string();
        let _ = self
            .cache
            .invalidate_entries_if(move |key, _| key.starts_with(&owned));
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
