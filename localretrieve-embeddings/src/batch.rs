//! Adaptive batch insert.
//!
//! FTS5 defers index construction to COMMIT, so an over-large transaction
//! can fail at commit time with memory pressure proportional to the
//! indexed payload. Sub-batch size is derived from sampled document size
//! against a fraction of the page-cache budget.

use tracing::{debug, info};

use localretrieve_core::constants::{FTS_OVERHEAD_MULTIPLIER, MAX_SUB_BATCH, MIN_SUB_BATCH};
use localretrieve_core::errors::{RetrieveResult, StorageError};
use localretrieve_core::models::{Document, NewDocument};
use localretrieve_storage::StorageEngine;

/// Outcome of a successful batch insert.
#[derive(Debug)]
pub struct BatchOutcome {
    pub inserted: Vec<Document>,
    pub sub_batches: usize,
    pub sub_batch_size: usize,
}

/// Estimate bytes a document costs at commit: raw fields plus the FTS
/// index overhead on the content.
fn estimate_doc_bytes(doc: &NewDocument) -> usize {
    let content = doc.content.len();
    let title = doc.title.as_ref().map_or(0, String::len);
    let metadata = doc
        .metadata
        .as_ref()
        .map_or(0, |m| m.to_string().len());
    content + title + metadata + FTS_OVERHEAD_MULTIPLIER * content
}

/// Pick a sub-batch size from the first ≤10 documents and the cache budget
/// (25% of the configured page cache).
pub fn compute_sub_batch_size(docs: &[NewDocument], cache_size_kib: u64) -> usize {
    let sample: Vec<usize> = docs.iter().take(10).map(estimate_doc_bytes).collect();
    if sample.is_empty() {
        return MIN_SUB_BATCH;
    }
    let per_doc = (sample.iter().sum::<usize>() / sample.len()).max(1);
    let budget = (cache_size_kib as usize * 1024) / 4;
    (budget / per_doc).clamp(MIN_SUB_BATCH, MAX_SUB_BATCH)
}

/// Insert documents in adaptively sized sub-batches, each one transaction.
///
/// A failed sub-batch rolls back and fails the whole operation; previously
/// committed sub-batches are retained and their count is reported in the
/// error.
pub fn batch_insert_documents(
    storage: &StorageEngine,
    collection_name: &str,
    docs: &[NewDocument],
) -> RetrieveResult<BatchOutcome> {
    if docs.is_empty() {
        return Ok(BatchOutcome {
            inserted: Vec::new(),
            sub_batches: 0,
            sub_batch_size: 0,
        });
    }

    let cache_size_kib = storage.config().sql.cache_size_kib;
    let sub_batch_size = compute_sub_batch_size(docs, cache_size_kib);
    debug!(
        total = docs.len(),
        sub_batch_size,
        "batch insert sized from cache budget"
    );

    let mut inserted = Vec::with_capacity(docs.len());
    let mut sub_batches = 0usize;
    for chunk in docs.chunks(sub_batch_size) {
        match storage.insert_documents_tx(collection_name, chunk) {
            Ok(mut chunk_docs) => {
                inserted.append(&mut chunk_docs);
                sub_batches += 1;
            }
            Err(e) => {
                return Err(StorageError::BulkInsertFailed {
                    committed_sub_batches: sub_batches,
                    committed_docs: inserted.len(),
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }

    info!(
        collection = %collection_name,
        documents = inserted.len(),
        sub_batches,
        "batch insert committed"
    );
    Ok(BatchOutcome {
        inserted,
        sub_batches,
        sub_batch_size,
    })
}
