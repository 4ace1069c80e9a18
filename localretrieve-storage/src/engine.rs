//! StorageEngine — owns the live SQLite image and the durability manager,
//! runs schema initialization at open, and exposes the storage operations
//! the higher layers build on.

use tracing::{info, warn};

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::constants::DEFAULT_COLLECTION;
use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::{
    CollectionInfo, Document, DurabilityState, NewDocument, ProcessingStatus, QueueItem,
    QueuePriority, QueuePurgeFilter, QueueStatus,
};

use crate::adapter::{Row, SqlValue, SqliteAdapter};
use crate::durability::DurabilityManager;
use crate::queries::{cache_ops, collection_ops, document_ops, queue_ops};
use crate::schema;

/// The main storage engine. Single-threaded: the owning worker serializes
/// every call.
#[derive(Debug)]
pub struct StorageEngine {
    adapter: SqliteAdapter,
    durability: DurabilityManager,
    config: RetrieveConfig,
}

impl StorageEngine {
    /// Open a database at a logical path.
    ///
    /// `opfs:/dir/name.db` paths restore any persisted image first;
    /// `:memory:` (or any other path) is volatile. Fatal conditions: the
    /// vector extension is unavailable, a persisted image is corrupt, or
    /// its schema version is below the minimum supported.
    pub fn open(logical_path: &str, config: RetrieveConfig) -> RetrieveResult<Self> {
        config.validate()?;
        let mut adapter = SqliteAdapter::open_in_memory(&config.sql)?;
        let durability = DurabilityManager::open(logical_path, &config.durability);
        let restored = durability.load_into(&mut adapter)?;
        schema::initialize(&adapter, &config)?;
        info!(
            path = %logical_path,
            persistent = durability.is_persistent(),
            restored,
            "storage engine opened"
        );
        Ok(Self {
            adapter,
            durability,
            config,
        })
    }

    /// Open a volatile engine (tests, store-unavailable fallback).
    pub fn open_in_memory(config: RetrieveConfig) -> RetrieveResult<Self> {
        Self::open(crate::durability::MEMORY_PATH, config)
    }

    pub fn config(&self) -> &RetrieveConfig {
        &self.config
    }

    pub fn adapter(&self) -> &SqliteAdapter {
        &self.adapter
    }

    /// Re-run the schema initialization protocol (RPC `initializeSchema`).
    pub fn initialize_schema(&self) -> RetrieveResult<()> {
        schema::initialize(&self.adapter, &self.config)
    }

    // ── Raw statement passthrough (RPC exec/select) ─────────────────────

    pub fn exec(&self, sql: &str, params: &[SqlValue]) -> RetrieveResult<usize> {
        self.adapter.exec(sql, params)
    }

    pub fn select(&self, sql: &str, params: &[SqlValue]) -> RetrieveResult<Vec<Row>> {
        self.adapter.select(sql, params)
    }

    // ── Collections ─────────────────────────────────────────────────────

    /// Create a collection: registry row plus its docs/fts/vec table triple.
    /// Dimensionality is fixed here and immutable afterwards.
    pub fn create_collection(
        &self,
        name: &str,
        dimensions: Option<usize>,
        provider: Option<&str>,
        collection_config: Option<serde_json::Value>,
    ) -> RetrieveResult<CollectionInfo> {
        schema::validate_collection_name(name)?;
        if collection_ops::get_collection(&self.adapter, name)?.is_some() {
            return Err(ValidationError::CollectionExists {
                name: name.to_string(),
            }
            .into());
        }
        let dims = dimensions.unwrap_or(self.config.embedding.dimensions);
        schema::create_collection_tables(&self.adapter, name, dims, &self.config.fts.tokenizer)?;
        collection_ops::insert_collection(
            &self.adapter,
            name,
            dims,
            provider,
            &collection_config.unwrap_or_else(|| serde_json::json!({})),
        )?;
        collection_ops::require_collection(&self.adapter, name)
    }

    pub fn get_collection(&self, name: &str) -> RetrieveResult<Option<CollectionInfo>> {
        collection_ops::get_collection(&self.adapter, name)
    }

    pub fn require_collection(&self, name: &str) -> RetrieveResult<CollectionInfo> {
        collection_ops::require_collection(&self.adapter, name)
    }

    pub fn list_collections(&self) -> RetrieveResult<Vec<CollectionInfo>> {
        collection_ops::list_collections(&self.adapter)
    }

    pub fn set_processing_status(
        &self,
        name: &str,
        status: ProcessingStatus,
    ) -> RetrieveResult<()> {
        collection_ops::set_processing_status(&self.adapter, name, status)
    }

    /// Drop a collection and everything in it: documents, FTS and vector
    /// rows, queue items (FK cascade), and cached embeddings.
    pub fn drop_collection(&self, name: &str) -> RetrieveResult<()> {
        if name == DEFAULT_COLLECTION {
            return Err(ValidationError::InvalidArgument {
                reason: "the default collection cannot be dropped".to_string(),
            }
            .into());
        }
        collection_ops::require_collection(&self.adapter, name)?;
        collection_ops::delete_collection_row(&self.adapter, name)?;
        schema::drop_collection_tables(&self.adapter, name)?;
        cache_ops::cache_invalidate_collection(&self.adapter, name)?;
        Ok(())
    }

    // ── Documents ───────────────────────────────────────────────────────

    pub fn insert_document(
        &self,
        collection_name: &str,
        doc: &NewDocument,
    ) -> RetrieveResult<Document> {
        let collection = self.require_collection(collection_name)?;
        document_ops::insert_document(&self.adapter, &collection, doc)
    }

    /// Insert a slice of documents in one transaction (one sub-batch of the
    /// adaptive bulk insert).
    pub fn insert_documents_tx(
        &self,
        collection_name: &str,
        docs: &[NewDocument],
    ) -> RetrieveResult<Vec<Document>> {
        let collection = self.require_collection(collection_name)?;
        document_ops::insert_documents_tx(&self.adapter, &collection, docs)
    }

    pub fn get_document(
        &self,
        collection_name: &str,
        id: &str,
    ) -> RetrieveResult<Option<Document>> {
        self.require_collection(collection_name)?;
        document_ops::get_document(&self.adapter, collection_name, id)
    }

    pub fn update_document(
        &self,
        collection_name: &str,
        doc: &NewDocument,
    ) -> RetrieveResult<Document> {
        let collection = self.require_collection(collection_name)?;
        document_ops::update_document(&self.adapter, &collection, doc)
    }

    pub fn delete_document(&self, collection_name: &str, id: &str) -> RetrieveResult<()> {
        self.require_collection(collection_name)?;
        document_ops::delete_document(&self.adapter, collection_name, id)
    }

    pub fn count_documents(&self, collection_name: &str) -> RetrieveResult<u64> {
        self.require_collection(collection_name)?;
        document_ops::count_documents(&self.adapter, collection_name)
    }

    /// Store (or regenerate) the embedding for a document's rowid.
    pub fn store_vector(
        &self,
        collection_name: &str,
        rowid: i64,
        vector: &[f32],
    ) -> RetrieveResult<()> {
        let collection = self.require_collection(collection_name)?;
        document_ops::store_vector(&self.adapter, &collection, rowid, vector)
    }

    // ── Embedding queue ─────────────────────────────────────────────────

    pub fn enqueue_embedding(
        &self,
        collection: &str,
        document_id: &str,
        text_content: &str,
        priority: QueuePriority,
    ) -> RetrieveResult<i64> {
        self.require_collection(collection)?;
        queue_ops::enqueue(&self.adapter, collection, document_id, text_content, priority)
    }

    pub fn fetch_pending_queue(
        &self,
        collection: Option<&str>,
        batch_size: usize,
    ) -> RetrieveResult<Vec<QueueItem>> {
        queue_ops::fetch_pending(&self.adapter, collection, batch_size)
    }

    pub fn mark_queue_processing(&self, id: i64) -> RetrieveResult<()> {
        queue_ops::mark_processing(&self.adapter, id)
    }

    pub fn mark_queue_completed(&self, id: i64) -> RetrieveResult<()> {
        queue_ops::mark_completed(&self.adapter, id)
    }

    pub fn mark_queue_failed_attempt(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
    ) -> RetrieveResult<localretrieve_core::models::QueueItemStatus> {
        queue_ops::mark_failed_attempt(&self.adapter, id, error, max_retries)
    }

    pub fn requeue_processing(&self, collection: Option<&str>) -> RetrieveResult<usize> {
        queue_ops::requeue_processing(&self.adapter, collection)
    }

    pub fn queue_status(&self, collection: Option<&str>) -> RetrieveResult<QueueStatus> {
        queue_ops::counts(&self.adapter, collection)
    }

    pub fn purge_queue(&self, filter: &QueuePurgeFilter) -> RetrieveResult<usize> {
        queue_ops::purge(&self.adapter, filter)
    }

    // ── L3 embedding cache ──────────────────────────────────────────────

    pub fn cache_get(&self, collection: &str, hash: &str) -> RetrieveResult<Option<Vec<f32>>> {
        cache_ops::cache_get(&self.adapter, collection, hash)
    }

    pub fn cache_put(
        &self,
        collection: &str,
        hash: &str,
        vector: &[f32],
        ttl_ms: u64,
    ) -> RetrieveResult<()> {
        cache_ops::cache_put(&self.adapter, collection, hash, vector, ttl_ms)
    }

    pub fn cache_invalidate_collection(&self, collection: &str) -> RetrieveResult<usize> {
        cache_ops::cache_invalidate_collection(&self.adapter, collection)
    }

    pub fn cache_invalidate_prefix(
        &self,
        collection: &str,
        prefix: &str,
    ) -> RetrieveResult<usize> {
        cache_ops::cache_invalidate_prefix(&self.adapter, collection, prefix)
    }

    pub fn cache_evict_expired(&self) -> RetrieveResult<usize> {
        cache_ops::cache_evict_expired(&self.adapter)
    }

    // ── Durability ──────────────────────────────────────────────────────

    /// Write a point-in-time snapshot to the durability store.
    pub fn snapshot(&mut self) -> RetrieveResult<()> {
        self.durability.snapshot(&self.adapter)
    }

    /// Immediate snapshot; used on shutdown and before export.
    pub fn force_sync(&mut self) -> RetrieveResult<()> {
        self.snapshot()
    }

    /// Export the whole database image.
    pub fn export_image(&mut self) -> RetrieveResult<Vec<u8>> {
        if self.durability.is_persistent() {
            if let Err(e) = self.durability.snapshot(&self.adapter) {
                warn!(error = %e, "pre-export snapshot failed");
            }
        }
        self.adapter.serialize()
    }

    /// Replace the live database with an imported image, re-validating its
    /// schema and snapshotting the result.
    pub fn import_image(&mut self, bytes: &[u8]) -> RetrieveResult<()> {
        self.adapter.deserialize(bytes)?;
        schema::initialize(&self.adapter, &self.config)?;
        self.snapshot()
    }

    /// Reset to an empty schema and remove the persisted image.
    pub fn clear(&mut self) -> RetrieveResult<()> {
        self.adapter = SqliteAdapter::open_in_memory(&self.config.sql)?;
        schema::initialize(&self.adapter, &self.config)?;
        self.durability.clear()
    }

    pub fn quota(&self) -> (i64, i64, i64) {
        self.durability.quota()
    }

    /// Sidecar file path for the persistent embedding cache tier, when the
    /// store is persistent.
    pub fn embedding_cache_sidecar(&self) -> Option<std::path::PathBuf> {
        self.durability.sidecar_path("embeddings.db")
    }

    pub fn durability_state(&self) -> DurabilityState {
        self.durability.state(self.adapter.image_size().ok())
    }

    /// Flush on close. Load/save errors at shutdown are logged, not raised.
    pub fn close(&mut self) {
        if let Err(e) = self.force_sync() {
            warn!(error = %e, "final snapshot on close failed");
        }
    }

    /// Total documents across all collections.
    pub fn total_documents(&self) -> RetrieveResult<u64> {
        let mut total = 0u64;
        for collection in self.list_collections()? {
            total += document_ops::count_documents(&self.adapter, &collection.name)?;
        }
        Ok(total)
    }
}
