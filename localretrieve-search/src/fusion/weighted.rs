//! Weighted fusion: `score = w_fts · norm(fts) + w_vec · norm(vec)`.
//!
//! Raw BM25 magnitudes are corpus-dependent and unbounded, so each
//! modality's list is max-normalized to `[0,1]` before weighting. With the
//! weights normalized to sum 1.0, fused scores stay in `[0,1]`.

use std::collections::HashMap;

use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::FusionWeights;

use super::{sort_fused, FusedHit};
use crate::sql::SubHit;

/// Fuse the FTS and vector lists with normalized weights.
pub fn fuse(
    fts_list: &[SubHit],
    vec_list: &[SubHit],
    weights: FusionWeights,
) -> RetrieveResult<Vec<FusedHit>> {
    let sum = weights.fts + weights.vec;
    if !(sum.is_finite()) || sum <= 0.0 || weights.fts < 0.0 || weights.vec < 0.0 {
        return Err(ValidationError::InvalidArgument {
            reason: format!(
                "fusion weights must be non-negative with a positive sum, got ({}, {})",
                weights.fts, weights.vec
            ),
        }
        .into());
    }
    let w_fts = weights.fts / sum;
    let w_vec = weights.vec / sum;

    let fts_max = max_score(fts_list);
    let vec_max = max_score(vec_list);

    let mut fused: HashMap<i64, FusedHit> = HashMap::new();

    for hit in fts_list {
        let entry = fused
            .entry(hit.rowid)
            .or_insert_with(|| FusedHit::from_sub_hit(hit));
        entry.score += w_fts * normalize(hit.score, fts_max);
        entry.fts_score = Some(hit.score);
    }
    for hit in vec_list {
        let entry = fused
            .entry(hit.rowid)
            .or_insert_with(|| FusedHit::from_sub_hit(hit));
        entry.score += w_vec * normalize(hit.score, vec_max);
        entry.vec_score = Some(hit.score);
    }

    let mut candidates: Vec<FusedHit> = fused.into_values().collect();
    sort_fused(&mut candidates);
    Ok(candidates)
}

fn max_score(list: &[SubHit]) -> f64 {
    list.iter().map(|h| h.score).fold(0.0, f64::max)
}

fn normalize(score: f64, max: f64) -> f64 {
    if max > 0.0 {
        (score / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
