//! SearchEngine: mode selection and execution.
//!
//! Keyword-only, vector-only, or hybrid — chosen by which query fields are
//! present. Hybrid runs both sub-queries at the requested limit and fuses.

use std::time::Instant;

use tracing::debug;

use localretrieve_core::config::SearchConfig;
use localretrieve_core::constants::DEFAULT_COLLECTION;
use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::{
    FusionMethod, FusionWeights, SearchHit, SearchRequest, SearchResponse, SearchStrategy,
};
use localretrieve_embeddings::EmbeddingPipeline;
use localretrieve_storage::StorageEngine;

use crate::fusion::{rrf, weighted, FusedHit};
use crate::sql;

/// Compiles and executes search requests.
pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Execute a search request. The pipeline is consulted only when the
    /// request asks for a generated query embedding.
    pub fn execute(
        &self,
        storage: &StorageEngine,
        pipeline: &EmbeddingPipeline,
        request: &SearchRequest,
    ) -> RetrieveResult<SearchResponse> {
        let started = Instant::now();
        let collection_name = request.collection.as_deref().unwrap_or(DEFAULT_COLLECTION);
        let collection = storage.require_collection(collection_name)?;
        let limit = request.limit.unwrap_or(self.config.default_limit);

        let text = request
            .query
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty());
        let mut vector = request.query.vector.clone();

        if text.is_none() && vector.is_none() {
            return Err(ValidationError::EmptyQuery.into());
        }

        // `enable_embedding` upgrades a text query to hybrid by generating
        // the query vector first.
        if vector.is_none() && request.options.enable_embedding {
            if let Some(t) = text {
                vector = Some(pipeline.generate(storage, collection_name, t)?);
            }
        }

        let (strategy, mut hits) = match (text, vector.as_deref()) {
            (Some(t), None) => {
                let list = sql::fts_search(storage, &collection, t, limit)?;
                (SearchStrategy::Keyword, single_modality(list, true))
            }
            (None, Some(v)) => {
                let list = sql::vector_search(storage, &collection, v, limit)?;
                (SearchStrategy::Vector, single_modality(list, false))
            }
            (Some(t), Some(v)) => {
                let fts_list = sql::fts_search(storage, &collection, t, limit)?;
                let vec_list = sql::vector_search(storage, &collection, v, limit)?;
                let fused = match self.fusion_method(request) {
                    FusionMethod::Rrf => rrf::fuse(&fts_list, &vec_list, self.config.fusion_k),
                    FusionMethod::Weighted => {
                        weighted::fuse(&fts_list, &vec_list, self.weights(request))?
                    }
                };
                (SearchStrategy::Hybrid, fused)
            }
            (None, None) => unreachable!("guarded above"),
        };

        apply_filters(&mut hits, request);
        hits.truncate(limit);

        let response = SearchResponse {
            hits: hits.into_iter().map(FusedHit::into_search_hit).collect(),
            search_time_ms: started.elapsed().as_millis() as u64,
            strategy,
        };
        debug!(
            collection = %collection_name,
            strategy = strategy.as_str(),
            hits = response.hits.len(),
            elapsed_ms = response.search_time_ms,
            "search complete"
        );
        Ok(response)
    }

    fn fusion_method(&self, request: &SearchRequest) -> FusionMethod {
        request
            .fusion
            .as_ref()
            .map_or(FusionMethod::Rrf, |f| f.method)
    }

    fn weights(&self, request: &SearchRequest) -> FusionWeights {
        request
            .fusion
            .as_ref()
            .and_then(|f| f.weights)
            .unwrap_or(FusionWeights {
                fts: self.config.weight_fts,
                vec: self.config.weight_vec,
            })
    }
}

/// Wrap a single-modality list as fused hits, keeping the raw score.
fn single_modality(list: Vec<sql::SubHit>, is_fts: bool) -> Vec<FusedHit> {
    list.iter()
        .map(|hit| {
            let mut fused = FusedHit {
                rowid: hit.rowid,
                id: hit.id.clone(),
                title: hit.title.clone(),
                content: hit.content.clone(),
                metadata: hit.metadata.clone(),
                score: hit.score,
                fts_score: None,
                vec_score: None,
            };
            if is_fts {
                fused.fts_score = Some(hit.score);
            } else {
                fused.vec_score = Some(hit.score);
            }
            fused
        })
        .collect()
}

/// `min_score` filters the final score; `threshold` filters the vector
/// similarity when one is present.
fn apply_filters(hits: &mut Vec<FusedHit>, request: &SearchRequest) {
    if let Some(min_score) = request.options.min_score {
        hits.retain(|h| h.score >= min_score);
    }
    if let Some(threshold) = request.options.threshold {
        hits.retain(|h| h.vec_score.map_or(true, |s| s >= threshold));
    }
}

/// Convenience used by the global searcher.
pub(crate) fn response_hits(response: SearchResponse) -> Vec<SearchHit> {
    response.hits
}
