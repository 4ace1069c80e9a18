//! Fusion of the lexical and dense ranked lists.

pub mod rrf;
pub mod weighted;

use localretrieve_core::models::SearchHit;

use crate::sql::SubHit;

/// A fused candidate carrying per-modality provenance.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub rowid: i64,
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub score: f64,
    pub fts_score: Option<f64>,
    pub vec_score: Option<f64>,
}

impl FusedHit {
    fn from_sub_hit(hit: &SubHit) -> Self {
        Self {
            rowid: hit.rowid,
            id: hit.id.clone(),
            title: hit.title.clone(),
            content: hit.content.clone(),
            metadata: hit.metadata.clone(),
            score: 0.0,
            fts_score: None,
            vec_score: None,
        }
    }

    pub fn into_search_hit(self) -> SearchHit {
        SearchHit {
            id: self.id,
            title: self.title,
            content: self.content,
            metadata: self.metadata,
            score: self.score,
            fts_score: self.fts_score,
            vec_score: self.vec_score,
            rowid: Some(self.rowid),
        }
    }
}

/// Sort fused candidates: score descending, ties broken by rowid ascending
/// so repeated runs return identical orderings.
pub(crate) fn sort_fused(candidates: &mut [FusedHit]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.rowid.cmp(&b.rowid))
    });
}
