//! Three-tier embedding cache.
//!
//! Lookup order: L1 memory (moka) → L2 persistent sidecar → L3 SQL table
//! in the main image. Hits promote the entry into the faster tiers; writes
//! go through all three. Keys are `(collection, blake3 fingerprint of the
//! normalized text)`.

pub mod l1_memory;
pub mod l2_sidecar;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use localretrieve_core::config::EmbeddingCacheConfig;
use localretrieve_core::errors::RetrieveResult;
use localretrieve_core::models::CacheStats;
use localretrieve_storage::StorageEngine;

pub use l1_memory::L1MemoryCache;
pub use l2_sidecar::L2SidecarCache;

/// Normalize text before fingerprinting: trim, collapse whitespace runs,
/// case-fold. "Hello  World" and "hello world" share one cache entry.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fingerprint of the normalized text.
pub fn fingerprint(text: &str) -> String {
    blake3::hash(normalize(text).as_bytes()).to_hex().to_string()
}

fn cache_key(collection: &str, hash: &str) -> String {
    format!("{collection}:{hash}")
}

/// Coordinates the three cache tiers and tracks hit/miss counters.
pub struct CacheCoordinator {
    l1: L1MemoryCache,
    l2: L2SidecarCache,
    sql_ttl_ms: u64,
    memory_hits: AtomicU64,
    persistent_hits: AtomicU64,
    sql_hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCoordinator {
    /// `sidecar` is the L2 file path; `None` keeps L2 in memory (volatile
    /// databases).
    pub fn new(config: &EmbeddingCacheConfig, sidecar: Option<&Path>) -> Self {
        let l2 = match sidecar {
            Some(path) => L2SidecarCache::open(path, config.persistent_ttl_ms),
            None => L2SidecarCache::new(config.persistent_ttl_ms),
        };
        Self {
            l1: L1MemoryCache::new(config.memory_max_entries, config.memory_ttl_ms),
            l2,
            sql_ttl_ms: config.sql_ttl_ms,
            memory_hits: AtomicU64::new(0),
            persistent_hits: AtomicU64::new(0),
            sql_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached embedding, promoting hits into faster tiers.
    pub fn get(
        &self,
        storage: &StorageEngine,
        collection: &str,
        text: &str,
    ) -> RetrieveResult<Option<Vec<f32>>> {
        let hash = fingerprint(text);
        let key = cache_key(collection, &hash);

        if let Some(vector) = self.l1.get(&key) {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(vector));
        }

        if let Some(vector) = self.l2.get(&key) {
            self.persistent_hits.fetch_add(1, Ordering::Relaxed);
            self.l1.insert(key, vector.clone());
            return Ok(Some(vector));
        }

        if let Some(vector) = storage.cache_get(collection, &hash)? {
            self.sql_hits.fetch_add(1, Ordering::Relaxed);
            self.l2.insert(key.clone(), &vector);
            self.l1.insert(key, vector.clone());
            return Ok(Some(vector));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Write-through to every tier.
    pub fn put(
        &self,
        storage: &StorageEngine,
        collection: &str,
        text: &str,
        vector: &[f32],
    ) -> RetrieveResult<()> {
        let hash = fingerprint(text);
        let key = cache_key(collection, &hash);
        self.l1.insert(key.clone(), vector.to_vec());
        self.l2.insert(key, vector);
        storage.cache_put(collection, &hash, vector, self.sql_ttl_ms)?;
        Ok(())
    }

    /// Drop every cached entry for a collection, across all tiers.
    pub fn invalidate_collection(
        &self,
        storage: &StorageEngine,
        collection: &str,
    ) -> RetrieveResult<()> {
        let prefix = format!("{collection}:");
        self.l1.invalidate_prefix(&prefix);
        self.l2.invalidate_prefix(&prefix);
        storage.cache_invalidate_collection(collection)?;
        debug!(collection = %collection, "embedding cache invalidated");
        Ok(())
    }

    /// Drop cached entries whose fingerprint starts with `hash_prefix`.
    pub fn invalidate_prefix(
        &self,
        storage: &StorageEngine,
        collection: &str,
        hash_prefix: &str,
    ) -> RetrieveResult<()> {
        let prefix = format!("{collection}:{hash_prefix}");
        self.l1.invalidate_prefix(&prefix);
        self.l2.invalidate_prefix(&prefix);
        storage.cache_invalidate_prefix(collection, hash_prefix)?;
        Ok(())
    }

    /// Drop everything.
    pub fn clear(&self, storage: &StorageEngine) -> RetrieveResult<()> {
        self.l1.clear();
        self.l2.clear();
        for collection in storage.list_collections()? {
            storage.cache_invalidate_collection(&collection.name)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            persistent_hits: self.persistent_hits.load(Ordering::Relaxed),
            sql_hits: self.sql_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
