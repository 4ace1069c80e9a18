//! Collection registry queries.

use chrono::Utc;

use localretrieve_core::constants::{CURRENT_SCHEMA_VERSION, DEFAULT_COLLECTION};
use localretrieve_core::errors::{RetrieveResult, StorageError};
use localretrieve_core::models::{CollectionInfo, EmbeddingStatus, ProcessingStatus};

use super::{datetime_to_ms, ms_to_datetime};
use crate::adapter::{Row, SqlValue, SqliteAdapter};
use crate::to_storage_err;

/// Insert a registry row for a new collection.
pub fn insert_collection(
    adapter: &SqliteAdapter,
    name: &str,
    dimensions: usize,
    provider: Option<&str>,
    config: &serde_json::Value,
) -> RetrieveResult<()> {
    let now = datetime_to_ms(Utc::now());
    let embedding_status = if provider.is_some() {
        EmbeddingStatus::Pending
    } else {
        EmbeddingStatus::Disabled
    };
    let config_json =
        serde_json::to_string(config).map_err(|e| to_storage_err(e.to_string()))?;
    adapter.exec(
        "INSERT INTO collections (
            name, created_at, updated_at, schema_version, config,
            embedding_provider, embedding_dimensions, embedding_status,
            processing_status
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'idle')",
        &[
            SqlValue::from(name),
            SqlValue::Integer(now),
            SqlValue::Integer(now),
            SqlValue::Integer(CURRENT_SCHEMA_VERSION as i64),
            SqlValue::from(config_json),
            SqlValue::from(provider.map(str::to_string)),
            SqlValue::Integer(dimensions as i64),
            SqlValue::from(embedding_status.as_str()),
        ],
    )?;
    Ok(())
}

/// Emit the `default` registry row if none exists.
pub fn ensure_default_row(adapter: &SqliteAdapter, dimensions: usize) -> RetrieveResult<()> {
    let count = adapter.query_i64(
        "SELECT COUNT(*) FROM collections WHERE name = ?1",
        &[SqlValue::from(DEFAULT_COLLECTION)],
    )?;
    if count == 0 {
        insert_collection(
            adapter,
            DEFAULT_COLLECTION,
            dimensions,
            None,
            &serde_json::json!({}),
        )?;
    }
    Ok(())
}

pub fn get_collection(
    adapter: &SqliteAdapter,
    name: &str,
) -> RetrieveResult<Option<CollectionInfo>> {
    let rows = adapter.select(
        "SELECT name, created_at, updated_at, schema_version, config,
                embedding_provider, embedding_dimensions, embedding_status,
                processing_status
         FROM collections WHERE name = ?1",
        &[SqlValue::from(name)],
    )?;
    rows.first().map(parse_collection_row).transpose()
}

/// Like [`get_collection`] but a missing collection is an error.
pub fn require_collection(adapter: &SqliteAdapter, name: &str) -> RetrieveResult<CollectionInfo> {
    get_collection(adapter, name)?.ok_or_else(|| {
        StorageError::CollectionNotFound {
            name: name.to_string(),
        }
        .into()
    })
}

pub fn list_collections(adapter: &SqliteAdapter) -> RetrieveResult<Vec<CollectionInfo>> {
    let rows = adapter.select(
        "SELECT name, created_at, updated_at, schema_version, config,
                embedding_provider, embedding_dimensions, embedding_status,
                processing_status
         FROM collections ORDER BY name",
        &[],
    )?;
    rows.iter().map(parse_collection_row).collect()
}

pub fn set_processing_status(
    adapter: &SqliteAdapter,
    name: &str,
    status: ProcessingStatus,
) -> RetrieveResult<()> {
    adapter.exec(
        "UPDATE collections SET processing_status = ?2, updated_at = ?3 WHERE name = ?1",
        &[
            SqlValue::from(name),
            SqlValue::from(status.as_str()),
            SqlValue::Integer(datetime_to_ms(Utc::now())),
        ],
    )?;
    Ok(())
}

pub fn set_embedding_status(
    adapter: &SqliteAdapter,
    name: &str,
    status: EmbeddingStatus,
) -> RetrieveResult<()> {
    adapter.exec(
        "UPDATE collections SET embedding_status = ?2, updated_at = ?3 WHERE name = ?1",
        &[
            SqlValue::from(name),
            SqlValue::from(status.as_str()),
            SqlValue::Integer(datetime_to_ms(Utc::now())),
        ],
    )?;
    Ok(())
}

/// Remove the registry row. Queue rows cascade via the foreign key; the
/// caller drops the table triple.
pub fn delete_collection_row(adapter: &SqliteAdapter, name: &str) -> RetrieveResult<()> {
    adapter.exec(
        "DELETE FROM collections WHERE name = ?1",
        &[SqlValue::from(name)],
    )?;
    Ok(())
}

fn parse_collection_row(row: &Row) -> RetrieveResult<CollectionInfo> {
    let text = |key: &str| -> RetrieveResult<String> {
        row.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| to_storage_err(format!("collections.{key}: expected text")))
    };
    let int = |key: &str| -> RetrieveResult<i64> {
        row.get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| to_storage_err(format!("collections.{key}: expected integer")))
    };

    let status_text = text("embedding_status")?;
    let embedding_status = EmbeddingStatus::parse(&status_text)
        .ok_or_else(|| to_storage_err(format!("bad embedding_status '{status_text}'")))?;
    let processing_text = text("processing_status")?;
    let processing_status = ProcessingStatus::parse(&processing_text)
        .ok_or_else(|| to_storage_err(format!("bad processing_status '{processing_text}'")))?;
    let config = serde_json::from_str(&text("config")?)
        .map_err(|e| to_storage_err(format!("collections.config: {e}")))?;

    Ok(CollectionInfo {
        name: text("name")?,
        created_at: ms_to_datetime(int("created_at")?),
        updated_at: ms_to_datetime(int("updated_at")?),
        schema_version: int("schema_version")? as u32,
        config,
        embedding_provider: row
            .get("embedding_provider")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        embedding_dimensions: int("embedding_dimensions")? as usize,
        embedding_status,
        processing_status,
    })
}
