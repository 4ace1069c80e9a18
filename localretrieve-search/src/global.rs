//! Cross-collection search: run the request against every known
//! collection, merge by score, optionally group by collection.

use std::time::Instant;

use localretrieve_core::errors::RetrieveResult;
use localretrieve_core::models::{GlobalSearchResponse, SearchHit, SearchRequest};
use localretrieve_embeddings::EmbeddingPipeline;
use localretrieve_storage::StorageEngine;

use crate::engine::{response_hits, SearchEngine};

/// Search every collection up to the request limit each, merge, and take
/// the top `limit` overall.
pub fn search_global(
    engine: &SearchEngine,
    storage: &StorageEngine,
    pipeline: &EmbeddingPipeline,
    request: &SearchRequest,
    group_by_collection: bool,
) -> RetrieveResult<GlobalSearchResponse> {
    let started = Instant::now();
    let limit = request.limit.unwrap_or(10);

    let mut merged: Vec<(String, SearchHit)> = Vec::new();
    for collection in storage.list_collections()? {
        let mut per_collection = request.clone();
        per_collection.collection = Some(collection.name.clone());
        // A query vector sized for one collection cannot run against
        // another dimensionality; skip those rather than failing the sweep.
        if let Some(vector) = &request.query.vector {
            if vector.len() != collection.embedding_dimensions {
                continue;
            }
        }
        let response = engine.execute(storage, pipeline, &per_collection)?;
        for hit in response_hits(response) {
            merged.push((collection.name.clone(), hit));
        }
    }

    merged.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(limit);

    let grouped = group_by_collection.then(|| {
        let mut groups: Vec<(String, Vec<SearchHit>)> = Vec::new();
        for (collection, hit) in &merged {
            match groups.iter_mut().find(|(name, _)| name == collection) {
                Some((_, hits)) => hits.push(hit.clone()),
                None => groups.push((collection.clone(), vec![hit.clone()])),
            }
        }
        groups
    });

    Ok(GlobalSearchResponse {
        hits: merged,
        grouped,
        search_time_ms: started.elapsed().as_millis() as u64,
    })
}
