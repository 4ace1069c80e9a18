//! SQL-backed embedding cache tier (L3). Keyed by
//! `(collection, text fingerprint)`, with absolute expiry timestamps.

use chrono::Utc;

use localretrieve_core::errors::RetrieveResult;

use super::datetime_to_ms;
use crate::adapter::{blob_to_vector, vector_to_blob, SqlValue, SqliteAdapter};

pub fn cache_get(
    adapter: &SqliteAdapter,
    collection: &str,
    text_hash: &str,
) -> RetrieveResult<Option<Vec<f32>>> {
    let now = datetime_to_ms(Utc::now());
    let rows = adapter.select(
        "SELECT embedding FROM embedding_cache
         WHERE collection = ?1 AND text_hash = ?2 AND expires_at > ?3",
        &[
            SqlValue::from(collection),
            SqlValue::from(text_hash),
            SqlValue::Integer(now),
        ],
    )?;
    Ok(rows
        .first()
        .and_then(|row| row.get("embedding"))
        .and_then(|v| v.as_blob())
        .map(blob_to_vector))
}

pub fn cache_put(
    adapter: &SqliteAdapter,
    collection: &str,
    text_hash: &str,
    vector: &[f32],
    ttl_ms: u64,
) -> RetrieveResult<()> {
    let now = datetime_to_ms(Utc::now());
    adapter.exec(
        "INSERT INTO embedding_cache
            (collection, text_hash, embedding, dimensions, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (collection, text_hash) DO UPDATE SET
            embedding = excluded.embedding,
            dimensions = excluded.dimensions,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at",
        &[
            SqlValue::from(collection),
            SqlValue::from(text_hash),
            SqlValue::Blob(vector_to_blob(vector)),
            SqlValue::Integer(vector.len() as i64),
            SqlValue::Integer(now),
            SqlValue::Integer(now + ttl_ms as i64),
        ],
    )?;
    Ok(())
}

/// Drop every cached entry for a collection.
pub fn cache_invalidate_collection(
    adapter: &SqliteAdapter,
    collection: &str,
) -> RetrieveResult<usize> {
    adapter.exec(
        "DELETE FROM embedding_cache WHERE collection = ?1",
        &[SqlValue::from(collection)],
    )
}

/// Drop cached entries whose fingerprint starts with `prefix`.
pub fn cache_invalidate_prefix(
    adapter: &SqliteAdapter,
    collection: &str,
    prefix: &str,
) -> RetrieveResult<usize> {
    // ESCAPE guards literal LIKE metacharacters in the prefix.
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    adapter.exec(
        "DELETE FROM embedding_cache
         WHERE collection = ?1 AND text_hash LIKE ?2 ESCAPE '\\'",
        &[
            SqlValue::from(collection),
            SqlValue::from(format!("{escaped}%")),
        ],
    )
}

/// Evict expired rows. Called opportunistically from the pipeline.
pub fn cache_evict_expired(adapter: &SqliteAdapter) -> RetrieveResult<usize> {
    adapter.exec(
        "DELETE FROM embedding_cache WHERE expires_at <= ?1",
        &[SqlValue::Integer(datetime_to_ms(Utc::now()))],
    )
}
