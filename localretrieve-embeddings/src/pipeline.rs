//! EmbeddingPipeline — the entry point of the embedding subsystem.
//!
//! Coordinates the provider registry and the three-tier cache for query
//! and document embeddings.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use localretrieve_core::config::EmbeddingConfig;
use localretrieve_core::errors::{EmbeddingError, RetrieveResult};
use localretrieve_core::models::{EmbeddingStatus, ModelStatus, PipelineStats};
use localretrieve_storage::StorageEngine;

use crate::cache::CacheCoordinator;
use crate::registry::ProviderRegistry;

/// The main embedding pipeline.
pub struct EmbeddingPipeline {
    registry: Arc<ProviderRegistry>,
    cache: CacheCoordinator,
    config: EmbeddingConfig,
    generated: AtomicU64,
}

impl EmbeddingPipeline {
    /// `sidecar` is the persistent cache file, when the durability store is
    /// persistent.
    pub fn new(config: EmbeddingConfig, sidecar: Option<&Path>) -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::new(config.provider_idle_expiry_ms)),
            cache: CacheCoordinator::new(&config.cache, sidecar),
            config,
            generated: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Generate (or fetch from cache) an embedding for arbitrary text in a
    /// collection's vector space.
    pub fn generate(
        &self,
        storage: &StorageEngine,
        collection_name: &str,
        text: &str,
    ) -> RetrieveResult<Vec<f32>> {
        let collection = storage.require_collection(collection_name)?;
        if collection.embedding_status == EmbeddingStatus::Disabled {
            return Err(EmbeddingError::Disabled {
                collection: collection_name.to_string(),
            }
            .into());
        }

        if let Some(cached) = self.cache.get(storage, collection_name, text)? {
            debug!(collection = %collection_name, "embedding cache hit");
            return Ok(cached);
        }

        let provider = self.registry.get(&collection, &self.config)?;
        let vector = provider.generate(text)?;
        if vector.len() != collection.embedding_dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                provider: provider.name().to_string(),
                expected: collection.embedding_dimensions,
                actual: vector.len(),
            }
            .into());
        }

        self.cache.put(storage, collection_name, text, &vector)?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(vector)
    }

    /// Batch variant of [`generate`]. Cached texts are served from cache;
    /// the rest go to the provider in one batch call.
    pub fn generate_batch(
        &self,
        storage: &StorageEngine,
        collection_name: &str,
        texts: &[String],
    ) -> RetrieveResult<Vec<Vec<f32>>> {
        let collection = storage.require_collection(collection_name)?;
        if collection.embedding_status == EmbeddingStatus::Disabled {
            return Err(EmbeddingError::Disabled {
                collection: collection_name.to_string(),
            }
            .into());
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut pending: Vec<(usize, String)> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(storage, collection_name, text)? {
                Some(vector) => results[i] = Some(vector),
                None => pending.push((i, text.clone())),
            }
        }

        if !pending.is_empty() {
            let provider = self.registry.get(&collection, &self.config)?;
            let inputs: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
            let vectors = provider.generate_batch(&inputs)?;
            if vectors.len() != pending.len() {
                return Err(EmbeddingError::InferenceFailed {
                    reason: format!(
                        "provider returned {} vectors for {} inputs",
                        vectors.len(),
                        pending.len()
                    ),
                }
                .into());
            }
            for ((i, text), vector) in pending.into_iter().zip(vectors) {
                if vector.len() != collection.embedding_dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        provider: provider.name().to_string(),
                        expected: collection.embedding_dimensions,
                        actual: vector.len(),
                    }
                    .into());
                }
                self.cache.put(storage, collection_name, &text, &vector)?;
                self.generated.fetch_add(1, Ordering::Relaxed);
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Pre-generate embeddings for a set of texts (`warmEmbeddingCache`).
    /// Returns the number of texts actually generated (misses).
    pub fn warm_cache(
        &self,
        storage: &StorageEngine,
        collection_name: &str,
        texts: &[String],
    ) -> RetrieveResult<usize> {
        let before = self.generated.load(Ordering::Relaxed);
        self.generate_batch(storage, collection_name, texts)?;
        Ok((self.generated.load(Ordering::Relaxed) - before) as usize)
    }

    /// Invalidate cached embeddings, scoped to a collection when given.
    pub fn clear_cache(
        &self,
        storage: &StorageEngine,
        collection: Option<&str>,
    ) -> RetrieveResult<()> {
        match collection {
            Some(name) => self.cache.invalidate_collection(storage, name),
            None => self.cache.clear(storage),
        }
    }

    pub fn model_statuses(&self) -> Vec<ModelStatus> {
        self.registry.statuses()
    }

    /// Initialize the provider for a collection ahead of first use
    /// (`preloadModels`).
    pub fn preload(&self, storage: &StorageEngine, collection_name: &str) -> RetrieveResult<()> {
        let collection = storage.require_collection(collection_name)?;
        let provider = self.registry.get(&collection, &self.config)?;
        provider.health_check()
    }

    /// Dispose every cached provider handle (`optimizeModelMemory`).
    pub fn optimize_memory(&self) -> usize {
        self.registry.clear()
    }

    pub fn stats(&self, storage: &StorageEngine) -> RetrieveResult<PipelineStats> {
        Ok(PipelineStats {
            cache: self.cache.stats(),
            embeddings_generated: self.generated.load(Ordering::Relaxed),
            queue: storage.queue_status(None)?,
            active_providers: self.registry.len(),
        })
    }
}
