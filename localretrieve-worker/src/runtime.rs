//! Runtime — owns every engine and implements the operations.
//!
//! Each operation follows the same shape: resolve arguments against
//! defaults, call into the owning engine, convert the result to the wire
//! JSON.

use std::time::Instant;

use serde_json::{json, Value};
use tracing::info;

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::constants::{CURRENT_SCHEMA_VERSION, DEFAULT_COLLECTION, VERSION};
use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::{
    EmbeddingStatus, EngineStats, NewDocument, QueuePriority, SearchOptions, SearchQuery,
    SearchRequest,
};
use localretrieve_embeddings::{batch, queue, EmbeddingPipeline};
use localretrieve_llm::{enhance, LlmClient};
use localretrieve_search::{global, SearchEngine};
use localretrieve_storage::adapter::Row;
use localretrieve_storage::{SqlValue, StorageEngine};

use crate::rpc::{ParamValue, Request, SearchWithLlmRequest};

/// Owns the storage engine, embedding pipeline, search engine, and LLM
/// client. Only the worker task holds one.
pub struct Runtime {
    config: RetrieveConfig,
    storage: Option<StorageEngine>,
    pipeline: Option<EmbeddingPipeline>,
    search: SearchEngine,
    llm: LlmClient,
}

impl Runtime {
    pub fn new(config: RetrieveConfig) -> Self {
        let search = SearchEngine::new(config.search.clone());
        let llm = LlmClient::new(config.llm.clone());
        Self {
            config,
            storage: None,
            pipeline: None,
            search,
            llm,
        }
    }

    pub fn is_open(&self) -> bool {
        self.storage.is_some()
    }

    fn storage(&self) -> RetrieveResult<&StorageEngine> {
        self.storage.as_ref().ok_or_else(not_open)
    }

    fn storage_mut(&mut self) -> RetrieveResult<&mut StorageEngine> {
        self.storage.as_mut().ok_or_else(not_open)
    }

    fn pipeline(&self) -> RetrieveResult<&EmbeddingPipeline> {
        self.pipeline.as_ref().ok_or_else(not_open)
    }

    /// Registry shared with the cleanup timer.
    pub fn provider_registry(
        &self,
    ) -> Option<std::sync::Arc<localretrieve_embeddings::ProviderRegistry>> {
        self.pipeline.as_ref().map(|p| p.registry().clone())
    }

    /// Execute one request. The worker loop has already validated it and
    /// enforced ordering; deadline expiry cancels any awaited HTTP work.
    pub async fn dispatch(&mut self, request: Request) -> RetrieveResult<Value> {
        match request {
            Request::Open { path } => self.op_open(&path),
            Request::Close => self.op_close(),
            Request::Ping => Ok(json!("pong")),
            Request::GetVersion => Ok(json!({
                "version": VERSION,
                "schema_version": CURRENT_SCHEMA_VERSION,
            })),
            Request::GetStats => self.op_stats(),

            Request::Exec { sql, params } => {
                let params = into_sql_params(params);
                let changed = self.storage()?.exec(&sql, &params)?;
                Ok(json!({ "rows_affected": changed }))
            }
            Request::Select { sql, params } => {
                let params = into_sql_params(params);
                let rows = self.storage()?.select(&sql, &params)?;
                Ok(json!({ "rows": rows_to_json(&rows) }))
            }
            Request::BulkInsert { sql, rows } => self.op_bulk_insert(&sql, rows),
            Request::InitVecExtension => {
                self.storage()?.adapter().init_vector_extension()?;
                Ok(json!({ "available": true }))
            }
            Request::InitializeSchema => {
                self.storage()?.initialize_schema()?;
                Ok(json!({ "schema_version": CURRENT_SCHEMA_VERSION }))
            }

            Request::CreateCollection {
                name,
                dimensions,
                provider,
                config,
            } => {
                let info = self.storage()?.create_collection(
                    &name,
                    dimensions,
                    provider.as_deref(),
                    config,
                )?;
                Ok(serde_json::to_value(info).unwrap_or_default())
            }
            Request::ListCollections => {
                let collections = self.storage()?.list_collections()?;
                Ok(serde_json::to_value(collections).unwrap_or_default())
            }
            Request::GetCollectionInfo { name } => {
                let info = self.storage()?.require_collection(&name)?;
                let documents = self.storage()?.count_documents(&name)?;
                let queue_status = self.storage()?.queue_status(Some(&name))?;
                Ok(json!({
                    "collection": info,
                    "documents": documents,
                    "queue": queue_status,
                }))
            }
            Request::DropCollection { name } => {
                self.storage()?.drop_collection(&name)?;
                if let Some(pipeline) = &self.pipeline {
                    pipeline.registry().remove(&name);
                }
                Ok(json!({ "dropped": name }))
            }

            Request::InsertDocumentWithEmbedding {
                collection,
                document,
            } => self.op_insert_document(collection_or_default(collection), document),
            Request::BatchInsertDocuments {
                collection,
                documents,
            } => {
                let collection = collection_or_default(collection);
                let outcome =
                    batch::batch_insert_documents(self.storage()?, &collection, &documents)?;
                Ok(json!({
                    "inserted": outcome.inserted.len(),
                    "sub_batches": outcome.sub_batches,
                    "sub_batch_size": outcome.sub_batch_size,
                    "ids": outcome.inserted.iter().map(|d| d.id.clone()).collect::<Vec<_>>(),
                }))
            }
            Request::GetDocument { collection, id } => {
                let collection = collection_or_default(collection);
                let document = self.storage()?.get_document(&collection, &id)?;
                Ok(serde_json::to_value(document).unwrap_or_default())
            }
            Request::UpdateDocument {
                collection,
                document,
            } => self.op_update_document(collection_or_default(collection), document),
            Request::DeleteDocument { collection, id } => {
                let collection = collection_or_default(collection);
                self.storage()?.delete_document(&collection, &id)?;
                Ok(json!({ "deleted": id }))
            }

            Request::Search { request } | Request::SearchAdvanced { request } => {
                let response = self
                    .search
                    .execute(self.storage()?, self.pipeline()?, &request)?;
                Ok(serde_json::to_value(response).unwrap_or_default())
            }
            Request::SearchText {
                collection,
                text,
                limit,
            } => {
                let request = SearchRequest {
                    collection,
                    query: SearchQuery {
                        text: Some(text),
                        vector: None,
                    },
                    limit,
                    fusion: None,
                    options: SearchOptions::default(),
                };
                let response = self
                    .search
                    .execute(self.storage()?, self.pipeline()?, &request)?;
                Ok(serde_json::to_value(response).unwrap_or_default())
            }
            Request::SearchSemantic {
                collection,
                text,
                limit,
            } => {
                let request = SearchRequest {
                    collection,
                    query: SearchQuery {
                        text: Some(text),
                        vector: None,
                    },
                    limit,
                    fusion: None,
                    options: SearchOptions {
                        enable_embedding: true,
                        min_score: None,
                        threshold: None,
                    },
                };
                let response = self
                    .search
                    .execute(self.storage()?, self.pipeline()?, &request)?;
                Ok(serde_json::to_value(response).unwrap_or_default())
            }
            Request::SearchGlobal {
                request,
                group_by_collection,
            } => {
                let response = global::search_global(
                    &self.search,
                    self.storage()?,
                    self.pipeline()?,
                    &request,
                    group_by_collection,
                )?;
                Ok(serde_json::to_value(response).unwrap_or_default())
            }

            Request::EnqueueEmbedding {
                collection,
                document_id,
                text,
                priority,
            } => {
                let collection = collection_or_default(collection);
                let id = self.storage()?.enqueue_embedding(
                    &collection,
                    &document_id,
                    &text,
                    priority.unwrap_or(QueuePriority::Normal),
                )?;
                Ok(json!({ "queue_id": id }))
            }
            Request::ProcessEmbeddingQueue {
                collection,
                batch_size,
                max_retries,
            } => {
                let result = queue::process(
                    self.pipeline()?,
                    self.storage()?,
                    collection.as_deref(),
                    batch_size.unwrap_or(self.config.queue.batch_size),
                    max_retries.unwrap_or(self.config.queue.max_retries),
                )?;
                Ok(serde_json::to_value(result).unwrap_or_default())
            }
            Request::GetQueueStatus { collection } => {
                let status = self.storage()?.queue_status(collection.as_deref())?;
                Ok(serde_json::to_value(status).unwrap_or_default())
            }
            Request::ClearEmbeddingQueue { filter } => {
                let purged = self.storage()?.purge_queue(&filter)?;
                Ok(json!({ "purged": purged }))
            }

            Request::GenerateQueryEmbedding { collection, text } => {
                let collection = collection_or_default(collection);
                let vector = self
                    .pipeline()?
                    .generate(self.storage()?, &collection, &text)?;
                let dimensions = vector.len();
                Ok(json!({ "vector": vector, "dimensions": dimensions }))
            }
            Request::BatchGenerateQueryEmbeddings { collection, texts } => {
                let collection = collection_or_default(collection);
                let vectors =
                    self.pipeline()?
                        .generate_batch(self.storage()?, &collection, &texts)?;
                Ok(json!({ "vectors": vectors }))
            }
            Request::WarmEmbeddingCache { collection, texts } => {
                let collection = collection_or_default(collection);
                let generated =
                    self.pipeline()?
                        .warm_cache(self.storage()?, &collection, &texts)?;
                Ok(json!({ "generated": generated, "warmed": texts.len() }))
            }
            Request::ClearEmbeddingCache { collection } => {
                self.pipeline()?
                    .clear_cache(self.storage()?, collection.as_deref())?;
                Ok(json!({ "cleared": true }))
            }
            Request::GetPipelineStats => {
                let stats = self.pipeline()?.stats(self.storage()?)?;
                Ok(serde_json::to_value(stats).unwrap_or_default())
            }
            Request::GetModelStatus => {
                let statuses = self.pipeline()?.model_statuses();
                Ok(serde_json::to_value(statuses).unwrap_or_default())
            }
            Request::PreloadModels { collections } => {
                for name in &collections {
                    self.pipeline()?.preload(self.storage()?, name)?;
                }
                Ok(json!({ "preloaded": collections }))
            }
            Request::OptimizeModelMemory => {
                let disposed = self.pipeline()?.optimize_memory();
                Ok(json!({ "disposed": disposed }))
            }

            Request::EnhanceQuery { query, options } => {
                let enhanced = enhance::enhance_query(&self.llm, &query, &options).await?;
                Ok(serde_json::to_value(enhanced).unwrap_or_default())
            }
            Request::SummarizeResults {
                query,
                results,
                options,
            } => {
                let summary =
                    enhance::summarize_results(&self.llm, &query, &results, &options).await?;
                Ok(serde_json::to_value(summary).unwrap_or_default())
            }
            Request::SearchWithLlm { request } => self.op_search_with_llm(request).await,
            Request::CallLlm { prompt, options } => {
                let response = self.llm.call(&prompt, &options).await?;
                Ok(serde_json::to_value(response).unwrap_or_default())
            }

            Request::Export => {
                let image = self.storage_mut()?.export_image()?;
                Ok(json!({ "image": image }))
            }
            Request::Import { image } => {
                self.storage_mut()?.import_image(&image)?;
                Ok(json!({ "imported_bytes": image.len() }))
            }
            Request::Clear => {
                self.storage_mut()?.clear()?;
                Ok(json!({ "cleared": true }))
            }
            Request::ForceSync => {
                self.storage_mut()?.force_sync()?;
                Ok(json!({ "synced": true }))
            }
        }
    }

    fn op_open(&mut self, path: &str) -> RetrieveResult<Value> {
        if self.storage.is_some() {
            return Err(ValidationError::InvalidArgument {
                reason: "database is already open".to_string(),
            }
            .into());
        }
        let storage = StorageEngine::open(path, self.config.clone())?;
        let sidecar = storage.embedding_cache_sidecar();
        let pipeline = EmbeddingPipeline::new(self.config.embedding.clone(), sidecar.as_deref());
        let persistent = storage.durability_state().persistent;
        self.storage = Some(storage);
        self.pipeline = Some(pipeline);
        info!(path = %path, persistent, "worker opened database");
        Ok(json!({ "path": path, "persistent": persistent }))
    }

    fn op_close(&mut self) -> RetrieveResult<Value> {
        if let Some(mut storage) = self.storage.take() {
            storage.close();
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.optimize_memory();
        }
        info!("worker closed database");
        Ok(json!({ "closed": true }))
    }

    fn op_bulk_insert(&self, sql: &str, rows: Vec<Vec<ParamValue>>) -> RetrieveResult<Value> {
        let storage = self.storage()?;
        storage.adapter().execute_batch("BEGIN IMMEDIATE")?;
        let mut inserted = 0usize;
        for row in rows {
            let params = into_sql_params(row);
            if let Err(e) = storage.exec(sql, &params) {
                let _ = storage.adapter().execute_batch("ROLLBACK");
                return Err(e);
            }
            inserted += 1;
        }
        storage.adapter().execute_batch("COMMIT")?;
        Ok(json!({ "inserted": inserted }))
    }

    /// Insert a document; record its embedding inline when the collection
    /// generates them, falling back to the background queue on provider
    /// failure.
    fn op_insert_document(
        &self,
        collection_name: String,
        document: NewDocument,
    ) -> RetrieveResult<Value> {
        let storage = self.storage()?;
        let collection = storage.require_collection(&collection_name)?;
        let had_vector = document.vector.is_some();
        let inserted = storage.insert_document(&collection_name, &document)?;

        let embedding = if had_vector {
            "provided"
        } else if collection.embedding_status == EmbeddingStatus::Disabled {
            "none"
        } else {
            match self
                .pipeline()?
                .generate(storage, &collection_name, &inserted.content)
            {
                Ok(vector) => {
                    storage.store_vector(&collection_name, inserted.rowid, &vector)?;
                    "generated"
                }
                Err(_) => {
                    storage.enqueue_embedding(
                        &collection_name,
                        &inserted.id,
                        &inserted.content,
                        QueuePriority::Normal,
                    )?;
                    "queued"
                }
            }
        };

        Ok(json!({ "document": inserted, "embedding": embedding }))
    }

    /// Update in place; content changes re-enqueue embedding generation.
    fn op_update_document(
        &self,
        collection_name: String,
        document: NewDocument,
    ) -> RetrieveResult<Value> {
        let storage = self.storage()?;
        let collection = storage.require_collection(&collection_name)?;
        let id = document.id.clone().ok_or(ValidationError::InvalidArgument {
            reason: "update requires a document id".to_string(),
        })?;
        let previous = storage.get_document(&collection_name, &id)?;
        let updated = storage.update_document(&collection_name, &document)?;

        let content_changed = previous.map_or(true, |p| p.content != updated.content);
        let reembed = content_changed
            && document.vector.is_none()
            && collection.embedding_status != EmbeddingStatus::Disabled;
        if reembed {
            storage.enqueue_embedding(
                &collection_name,
                &updated.id,
                &updated.content,
                QueuePriority::Normal,
            )?;
        }
        Ok(json!({ "document": updated, "reembed_queued": reembed }))
    }

    async fn op_search_with_llm(&mut self, request: SearchWithLlmRequest) -> RetrieveResult<Value> {
        let total_started = Instant::now();
        let mut llm_time_ms = 0u64;

        // Optional query enhancement ahead of the search.
        let mut search_request = request.search.clone();
        let mut enhanced: Option<enhance::EnhancedQuery> = None;
        if request.enhance_query {
            let original = search_request
                .query
                .text
                .clone()
                .ok_or(ValidationError::EmptyQuery)?;
            let llm_started = Instant::now();
            let result = enhance::enhance_query(&self.llm, &original, &request.llm).await?;
            llm_time_ms += llm_started.elapsed().as_millis() as u64;
            search_request.query.text = Some(result.enhanced_query.clone());
            enhanced = Some(result);
        }

        let response = self
            .search
            .execute(self.storage()?, self.pipeline()?, &search_request)?;
        let search_time_ms = response.search_time_ms;

        // Optional summary over the results.
        let mut summary: Option<enhance::ResultSummary> = None;
        if request.summarize_results && !response.hits.is_empty() {
            let query_text = search_request.query.text.as_deref().unwrap_or_default();
            let llm_started = Instant::now();
            let result = enhance::summarize_results(
                &self.llm,
                query_text,
                &response.hits,
                &request.llm,
            )
            .await?;
            llm_time_ms += llm_started.elapsed().as_millis() as u64;
            summary = Some(result);
        }

        Ok(json!({
            "enhanced_query": enhanced,
            "results": response,
            "summary": summary,
            "search_time_ms": search_time_ms,
            "llm_time_ms": llm_time_ms,
            "total_time_ms": total_started.elapsed().as_millis() as u64,
        }))
    }

    fn op_stats(&self) -> RetrieveResult<Value> {
        let storage = self.storage()?;
        let pipeline = self.pipeline()?;
        let stats = EngineStats {
            collections: storage.list_collections()?.len(),
            documents: storage.total_documents()?,
            queue: storage.queue_status(None)?,
            cache: pipeline.stats(storage)?.cache,
            durability: storage.durability_state(),
        };
        Ok(serde_json::to_value(stats).unwrap_or_default())
    }

    /// Final flush when the worker loop winds down.
    pub fn shutdown(&mut self) {
        if let Some(mut storage) = self.storage.take() {
            storage.close();
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.optimize_memory();
        }
    }
}

fn not_open() -> localretrieve_core::RetrieveError {
    ValidationError::InvalidArgument {
        reason: "database is not open".to_string(),
    }
    .into()
}

fn collection_or_default(collection: Option<String>) -> String {
    collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
}

fn into_sql_params(params: Vec<ParamValue>) -> Vec<SqlValue> {
    params.into_iter().map(ParamValue::into_sql_value).collect()
}

/// Result rows as JSON: column name → scalar; blobs become byte arrays.
fn rows_to_json(rows: &[Row]) -> Value {
    let mapped: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (name, value) in row {
                let json_value = match value {
                    SqlValue::Null => Value::Null,
                    SqlValue::Integer(v) => json!(v),
                    SqlValue::Real(v) => json!(v),
                    SqlValue::Text(s) => json!(s),
                    SqlValue::Blob(b) => json!(b),
                };
                object.insert(name.clone(), json_value);
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(mapped)
}
