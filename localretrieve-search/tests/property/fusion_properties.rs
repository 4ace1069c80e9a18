//! Property tests for the fusion layer: score bounds, ordering
//! discipline, and determinism.

use localretrieve_core::models::FusionWeights;
use localretrieve_search::fusion::{rrf, weighted};
use localretrieve_search::sql::SubHit;
use proptest::prelude::*;

fn sub_hit(rowid: i64, score: f64) -> SubHit {
    SubHit {
        rowid,
        id: format!("doc-{rowid}"),
        title: None,
        content: String::new(),
        metadata: None,
        score,
    }
}

/// A ranked list: unique rowids with descending positive scores.
fn ranked_list(max_len: usize) -> impl Strategy<Value = Vec<SubHit>> {
    prop::collection::btree_set(0i64..200, 0..=max_len).prop_map(|rowids| {
        rowids
            .into_iter()
            .enumerate()
            .map(|(rank, rowid)| sub_hit(rowid, 100.0 / (rank + 1) as f64))
            .collect()
    })
}

proptest! {
    #[test]
    fn rrf_scores_bounded_by_two_over_k_plus_one(
        fts in ranked_list(20),
        vec in ranked_list(20),
        k in 1u32..200,
    ) {
        for hit in rrf::fuse(&fts, &vec, k) {
            prop_assert!(hit.score > 0.0);
            prop_assert!(hit.score <= 2.0 / (k as f64 + 1.0) + 1e-12);
        }
    }

    #[test]
    fn rrf_output_is_sorted_and_deduplicated(
        fts in ranked_list(20),
        vec in ranked_list(20),
    ) {
        let fused = rrf::fuse(&fts, &vec, 60);
        for window in fused.windows(2) {
            prop_assert!(window[0].score >= window[1].score);
            if (window[0].score - window[1].score).abs() < f64::EPSILON {
                prop_assert!(window[0].rowid < window[1].rowid);
            }
        }
        let mut rowids: Vec<i64> = fused.iter().map(|h| h.rowid).collect();
        rowids.sort_unstable();
        rowids.dedup();
        prop_assert_eq!(rowids.len(), fused.len());
    }

    #[test]
    fn rrf_is_deterministic(
        fts in ranked_list(15),
        vec in ranked_list(15),
    ) {
        let a: Vec<i64> = rrf::fuse(&fts, &vec, 60).iter().map(|h| h.rowid).collect();
        let b: Vec<i64> = rrf::fuse(&fts, &vec, 60).iter().map(|h| h.rowid).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn weighted_scores_stay_in_unit_interval(
        fts in ranked_list(20),
        vec in ranked_list(20),
        w_fts in 0.01f64..10.0,
        w_vec in 0.01f64..10.0,
    ) {
        let fused = weighted::fuse(&fts, &vec, FusionWeights { fts: w_fts, vec: w_vec }).unwrap();
        for hit in fused {
            prop_assert!(hit.score >= 0.0);
            prop_assert!(hit.score <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn union_of_inputs_equals_output(
        fts in ranked_list(20),
        vec in ranked_list(20),
    ) {
        let fused = rrf::fuse(&fts, &vec, 60);
        let mut expected: Vec<i64> = fts.iter().chain(vec.iter()).map(|h| h.rowid).collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(fused.len(), expected.len());
    }
}
