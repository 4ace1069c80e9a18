//! Background queue processing.
//!
//! One `process` pass: return stranded `processing` rows to `pending`,
//! take a priority-ordered batch, generate embeddings, store vectors at
//! the documents' rowids, and record per-item outcomes with retry
//! bookkeeping.

use tracing::{debug, warn};

use localretrieve_core::errors::{RetrieveResult, StorageError};
use localretrieve_core::models::{ProcessResult, ProcessingStatus, QueueItemStatus};
use localretrieve_storage::StorageEngine;

use crate::pipeline::EmbeddingPipeline;

/// Process up to `batch_size` pending queue items.
pub fn process(
    pipeline: &EmbeddingPipeline,
    storage: &StorageEngine,
    collection: Option<&str>,
    batch_size: usize,
    max_retries: u32,
) -> RetrieveResult<ProcessResult> {
    // No item may stay `processing` across two passes.
    let stranded = storage.requeue_processing(collection)?;
    if stranded > 0 {
        warn!(count = stranded, "stranded queue items returned to pending");
    }

    let items = storage.fetch_pending_queue(collection, batch_size)?;
    let mut result = ProcessResult::default();

    if items.is_empty() {
        result.remaining_in_queue = storage.queue_status(collection)?.pending;
        return Ok(result);
    }

    if let Some(name) = collection {
        storage.set_processing_status(name, ProcessingStatus::Processing)?;
    }

    for item in &items {
        storage.mark_queue_processing(item.id)?;

        let outcome = embed_item(pipeline, storage, &item.collection, &item.document_id, &item.text_content);
        match outcome {
            Ok(()) => {
                storage.mark_queue_completed(item.id)?;
                result.processed += 1;
            }
            Err(e) => {
                let message = e.to_string();
                let status =
                    storage.mark_queue_failed_attempt(item.id, &message, max_retries)?;
                if status == QueueItemStatus::Failed {
                    result.failed += 1;
                }
                result.errors.push(format!(
                    "{}/{}: {message}",
                    item.collection, item.document_id
                ));
                debug!(
                    collection = %item.collection,
                    document_id = %item.document_id,
                    retry = item.retry_count,
                    error = %message,
                    "queue item failed"
                );
            }
        }
    }

    if let Some(name) = collection {
        storage.set_processing_status(name, ProcessingStatus::Idle)?;
    }

    result.remaining_in_queue = storage.queue_status(collection)?.pending;
    Ok(result)
}

/// Generate and store the vector for one queue item.
fn embed_item(
    pipeline: &EmbeddingPipeline,
    storage: &StorageEngine,
    collection: &str,
    document_id: &str,
    text: &str,
) -> RetrieveResult<()> {
    let document = storage
        .get_document(collection, document_id)?
        .ok_or_else(|| StorageError::DocumentNotFound {
            id: document_id.to_string(),
            collection: collection.to_string(),
        })?;
    let vector = pipeline.generate(storage, collection, text)?;
    storage.store_vector(collection, document.rowid, &vector)
}
