//! Reciprocal Rank Fusion: `score = Σ 1/(k + rank_i)`.
//!
//! Combines the two ranked lists without score normalization; a result
//! missing from one list contributes 0 from that side. Ranks are 1-based,
//! so every score lies in `(0, 2/(k+1)]`.

use std::collections::HashMap;

use super::{sort_fused, FusedHit};
use crate::sql::SubHit;

/// Fuse the FTS and vector lists with RRF constant `k`.
pub fn fuse(fts_list: &[SubHit], vec_list: &[SubHit], k: u32) -> Vec<FusedHit> {
    let mut fused: HashMap<i64, FusedHit> = HashMap::new();

    for (rank, hit) in fts_list.iter().enumerate() {
        let entry = fused
            .entry(hit.rowid)
            .or_insert_with(|| FusedHit::from_sub_hit(hit));
        entry.score += 1.0 / (k as f64 + (rank + 1) as f64);
        entry.fts_score = Some(hit.score);
    }

    for (rank, hit) in vec_list.iter().enumerate() {
        let entry = fused
            .entry(hit.rowid)
            .or_insert_with(|| FusedHit::from_sub_hit(hit));
        entry.score += 1.0 / (k as f64 + (rank + 1) as f64);
        entry.vec_score = Some(hit.score);
    }

    let mut candidates: Vec<FusedHit> = fused.into_values().collect();
    sort_fused(&mut candidates);
    candidates
}
