//! Sub-query assembly and execution.
//!
//! Both modalities bind their user-supplied payload — the FTS MATCH string
//! and the serialized query vector — as parameters. Table names are
//! schema-validated collection identifiers and may be interpolated.

use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::CollectionInfo;
use localretrieve_storage::adapter::{Row, SqlValue};
use localretrieve_storage::StorageEngine;

use crate::to_search_err;

/// One row out of a single-modality sub-query, before fusion.
#[derive(Debug, Clone)]
pub struct SubHit {
    pub rowid: i64,
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    /// `-bm25` for FTS, `1/(1+distance)` for vectors. Higher is better.
    pub score: f64,
}

/// Rewrite a free-text query for FTS5: whitespace-split terms, each quoted,
/// joined with OR. The result is always bound, never interpolated.
pub fn build_match_query(text: &str) -> String {
    text.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Keyword sub-query: BM25-ranked FTS matches joined to their documents.
pub fn fts_search(
    storage: &StorageEngine,
    collection: &CollectionInfo,
    text: &str,
    limit: usize,
) -> RetrieveResult<Vec<SubHit>> {
    let match_query = build_match_query(text);
    if match_query.is_empty() {
        return Err(ValidationError::EmptyQuery.into());
    }
    let table = &collection.name;
    let rows = storage.select(
        &format!(
            "SELECT d.rowid AS rowid, d.id AS id, d.title AS title,
                    d.content AS content, d.metadata AS metadata,
                    -bm25(fts_{table}) AS score
             FROM fts_{table}
             JOIN docs_{table} d ON d.rowid = fts_{table}.rowid
             WHERE fts_{table} MATCH ?1
             ORDER BY bm25(fts_{table})
             LIMIT ?2"
        ),
        &[
            SqlValue::from(match_query),
            SqlValue::Integer(limit as i64),
        ],
    )?;
    rows.iter().map(parse_sub_hit).collect()
}

/// Vector sub-query: KNN against `vec_<c>_dense`, the query vector bound
/// as a JSON numeric array. Distance ascending becomes `1/(1+distance)`
/// descending.
pub fn vector_search(
    storage: &StorageEngine,
    collection: &CollectionInfo,
    vector: &[f32],
    limit: usize,
) -> RetrieveResult<Vec<SubHit>> {
    if vector.len() != collection.embedding_dimensions {
        return Err(ValidationError::DimensionMismatch {
            expected: collection.embedding_dimensions,
            actual: vector.len(),
        }
        .into());
    }
    let vector_json =
        serde_json::to_string(vector).map_err(|e| to_search_err(e.to_string()))?;
    let table = &collection.name;
    let rows = storage.select(
        &format!(
            "SELECT v.rowid AS rowid, v.distance AS distance,
                    d.id AS id, d.title AS title, d.content AS content,
                    d.metadata AS metadata
             FROM (SELECT rowid, distance FROM vec_{table}_dense
                   WHERE embedding MATCH ?1
                   ORDER BY distance LIMIT ?2) v
             JOIN docs_{table} d ON d.rowid = v.rowid
             ORDER BY v.distance"
        ),
        &[
            SqlValue::from(vector_json),
            SqlValue::Integer(limit as i64),
        ],
    )?;
    rows.iter()
        .map(|row| {
            let mut hit = parse_sub_hit_base(row)?;
            let distance = row
                .get("distance")
                .and_then(SqlValue::as_f64)
                .ok_or_else(|| to_search_err("vector row without distance"))?;
            hit.score = 1.0 / (1.0 + distance);
            Ok(hit)
        })
        .collect()
}

fn parse_sub_hit(row: &Row) -> RetrieveResult<SubHit> {
    let mut hit = parse_sub_hit_base(row)?;
    hit.score = row
        .get("score")
        .and_then(SqlValue::as_f64)
        .ok_or_else(|| to_search_err("FTS row without score"))?;
    Ok(hit)
}

fn parse_sub_hit_base(row: &Row) -> RetrieveResult<SubHit> {
    let metadata = row
        .get("metadata")
        .and_then(SqlValue::as_str)
        .map(|text| {
            serde_json::from_str(text).map_err(|e| to_search_err(format!("metadata: {e}")))
        })
        .transpose()?;
    Ok(SubHit {
        rowid: row
            .get("rowid")
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| to_search_err("row without rowid"))?,
        id: row
            .get("id")
            .and_then(SqlValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| to_search_err("row without id"))?,
        title: row
            .get("title")
            .and_then(SqlValue::as_str)
            .map(str::to_string),
        content: row
            .get("content")
            .and_then(SqlValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| to_search_err("row without content"))?,
        metadata,
        score: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_token_queries_become_or_of_quoted_terms() {
        assert_eq!(
            build_match_query("machine learning"),
            "\"machine\" OR \"learning\""
        );
        assert_eq!(build_match_query("single"), "\"single\"");
    }

    #[test]
    fn quotes_inside_terms_are_escaped() {
        assert_eq!(build_match_query("say \"hi\""), "\"say\" OR \"\"\"hi\"\"\"");
    }

    #[test]
    fn cyrillic_terms_pass_through() {
        assert_eq!(
            build_match_query("Александр Пушкин"),
            "\"Александр\" OR \"Пушкин\""
        );
    }
}
