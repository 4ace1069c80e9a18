//! Per-collection provider registry.
//!
//! Handles are created lazily on first request; the DashMap entry lock
//! makes racing callers share one initialization. Idle handles expire
//! after 30 minutes (configurable) and are disposed by the cleanup timer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use localretrieve_core::config::EmbeddingConfig;
use localretrieve_core::errors::RetrieveResult;
use localretrieve_core::models::{CollectionInfo, ModelStatus};
use localretrieve_core::traits::EmbeddingProvider;

use crate::providers::{self, ProviderSpec};

struct ProviderHandle {
    provider: Arc<dyn EmbeddingProvider>,
    kind: String,
    dimensions: usize,
    last_used_ms: AtomicI64,
}

/// Process-wide map from collection name to a cached provider handle.
pub struct ProviderRegistry {
    handles: DashMap<String, ProviderHandle>,
    idle_expiry_ms: i64,
}

impl ProviderRegistry {
    pub fn new(idle_expiry_ms: u64) -> Self {
        Self {
            handles: DashMap::new(),
            idle_expiry_ms: idle_expiry_ms as i64,
        }
    }

    /// Get (or lazily create) the provider for a collection.
    pub fn get(
        &self,
        collection: &CollectionInfo,
        config: &EmbeddingConfig,
    ) -> RetrieveResult<Arc<dyn EmbeddingProvider>> {
        let now = Utc::now().timestamp_millis();
        // The entry API holds the shard lock across initialization, so two
        // callers racing for the same collection share one provider build.
        match self.handles.entry(collection.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                let handle = occupied.get();
                handle.last_used_ms.store(now, Ordering::Relaxed);
                Ok(Arc::clone(&handle.provider))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let spec = ProviderSpec::resolve(
                    collection.embedding_provider.as_deref(),
                    config,
                    collection.embedding_dimensions,
                );
                let provider: Arc<dyn EmbeddingProvider> =
                    Arc::from(providers::create_provider(&spec)?);
                info!(
                    collection = %collection.name,
                    provider = provider.name(),
                    dims = provider.dimensions(),
                    "embedding provider initialized"
                );
                let handle = ProviderHandle {
                    provider: Arc::clone(&provider),
                    kind: spec.kind,
                    dimensions: collection.embedding_dimensions,
                    last_used_ms: AtomicI64::new(now),
                };
                vacant.insert(handle);
                Ok(provider)
            }
        }
    }

    /// Dispose and drop the handle for one collection.
    pub fn remove(&self, collection: &str) {
        if let Some((_, handle)) = self.handles.remove(collection) {
            handle.provider.dispose();
            debug!(collection = %collection, "provider handle removed");
        }
    }

    /// Dispose handles idle longer than the expiry. Returns how many were
    /// dropped.
    pub fn cleanup_idle(&self) -> usize {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<String> = self
            .handles
            .iter()
            .filter(|entry| {
                now - entry.value().last_used_ms.load(Ordering::Relaxed) > self.idle_expiry_ms
            })
            .map(|entry| entry.key().clone())
            .collect();
        for name in &expired {
            self.remove(name);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "idle provider handles disposed");
        }
        expired.len()
    }

    /// Dispose every handle (`optimizeModelMemory`).
    pub fn clear(&self) -> usize {
        let names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        for name in &names {
            self.remove(name);
        }
        names.len()
    }

    /// One status entry per cached handle (`getModelStatus`).
    pub fn statuses(&self) -> Vec<ModelStatus> {
        self.handles
            .iter()
            .map(|entry| {
                let handle = entry.value();
                ModelStatus {
                    collection: entry.key().clone(),
                    provider: format!("{} ({})", handle.provider.name(), handle.kind),
                    dimensions: handle.dimensions,
                    last_used: chrono::DateTime::from_timestamp_millis(
                        handle.last_used_ms.load(Ordering::Relaxed),
                    )
                    .unwrap_or_else(Utc::now),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
