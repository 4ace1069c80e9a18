use serde::{Deserialize, Serialize};

/// A search request as it arrives over the RPC boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Defaults to `default`.
    pub collection: Option<String>,
    pub query: SearchQuery,
    pub limit: Option<usize>,
    pub fusion: Option<FusionSpec>,
    #[serde(default)]
    pub options: SearchOptions,
}

/// Query modalities. At least one of `text`/`vector` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
}

/// How to combine the lexical and dense result lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    Rrf,
    Weighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSpec {
    pub method: FusionMethod,
    pub weights: Option<FusionWeights>,
}

/// Modality weights for weighted fusion. Normalized to sum 1.0 before use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub fts: f64,
    pub vec: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Generate a query embedding from `text` and run hybrid search.
    pub enable_embedding: bool,
    pub min_score: Option<f64>,
    pub threshold: Option<f64>,
}

/// Which execution mode a search ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Keyword,
    Vector,
    Hybrid,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    /// Fused (or single-modality) score, higher is better.
    pub score: f64,
    /// Lexical score (`-bm25`) when the hit came through FTS.
    pub fts_score: Option<f64>,
    /// Dense score (`1/(1+distance)`) when the hit came through the vector
    /// index.
    pub vec_score: Option<f64>,
    /// Internal join key; used for deterministic tie-breaking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rowid: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub search_time_ms: u64,
    pub strategy: SearchStrategy,
}

/// Cross-collection search result, optionally grouped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearchResponse {
    /// Flat merged ranking. `collection` names the source of each hit.
    pub hits: Vec<(String, SearchHit)>,
    /// Present when grouping was requested.
    pub grouped: Option<Vec<(String, Vec<SearchHit>)>>,
    pub search_time_ms: u64,
}
