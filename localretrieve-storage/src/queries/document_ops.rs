//! Document CRUD. Every write keeps the document row, its FTS row, and
//! (when present) its vector row in one atomic unit, all joined by rowid.

use chrono::Utc;

use localretrieve_core::errors::{RetrieveResult, StorageError, ValidationError};
use localretrieve_core::models::{CollectionInfo, Document, NewDocument};

use super::{datetime_to_ms, ms_to_datetime};
use crate::adapter::{vector_to_blob, Row, SqlValue, SqliteAdapter};
use crate::to_storage_err;

/// Insert one document (and its FTS/vector rows) transactionally.
pub fn insert_document(
    adapter: &SqliteAdapter,
    collection: &CollectionInfo,
    doc: &NewDocument,
) -> RetrieveResult<Document> {
    adapter.execute_batch("BEGIN IMMEDIATE")?;
    match insert_document_inner(adapter, collection, doc) {
        Ok(inserted) => {
            adapter.execute_batch("COMMIT")?;
            Ok(inserted)
        }
        Err(e) => {
            let _ = adapter.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Insert a slice of documents inside a single `BEGIN IMMEDIATE`
/// transaction. The caller (adaptive batch insert) decides slice sizes.
pub fn insert_documents_tx(
    adapter: &SqliteAdapter,
    collection: &CollectionInfo,
    docs: &[NewDocument],
) -> RetrieveResult<Vec<Document>> {
    adapter.execute_batch("BEGIN IMMEDIATE")?;
    let mut inserted = Vec::with_capacity(docs.len());
    for doc in docs {
        match insert_document_inner(adapter, collection, doc) {
            Ok(d) => inserted.push(d),
            Err(e) => {
                let _ = adapter.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }
    if let Err(e) = adapter.execute_batch("COMMIT") {
        let _ = adapter.execute_batch("ROLLBACK");
        return Err(e);
    }
    Ok(inserted)
}

/// Inner insert logic, assuming an open transaction.
fn insert_document_inner(
    adapter: &SqliteAdapter,
    collection: &CollectionInfo,
    doc: &NewDocument,
) -> RetrieveResult<Document> {
    if doc.content.is_empty() {
        return Err(ValidationError::EmptyContent.into());
    }
    if let Some(vector) = &doc.vector {
        check_dimensions(collection, vector)?;
    }

    let id = doc
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let now = datetime_to_ms(Utc::now());
    // Metadata is stored exactly as serialized here and echoed back on
    // read; no keys are added or rewritten.
    let metadata_text = doc
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m).map_err(|e| to_storage_err(e.to_string())))
        .transpose()?;

    let table = &collection.name;
    adapter.exec(
        &format!(
            "INSERT INTO docs_{table}
                (id, title, content, collection, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        &[
            SqlValue::from(id.clone()),
            SqlValue::from(doc.title.clone()),
            SqlValue::from(doc.content.clone()),
            SqlValue::from(table.as_str()),
            SqlValue::from(metadata_text.clone()),
            SqlValue::Integer(now),
            SqlValue::Integer(now),
        ],
    )?;
    let rowid = adapter.query_i64("SELECT last_insert_rowid()", &[])?;

    insert_fts_row(
        adapter,
        table,
        rowid,
        &id,
        doc.title.as_deref(),
        &doc.content,
        metadata_text.as_deref(),
    )?;

    if let Some(vector) = &doc.vector {
        insert_vector_row(adapter, table, rowid, vector)?;
    }

    Ok(Document {
        id,
        rowid,
        title: doc.title.clone(),
        content: doc.content.clone(),
        collection: table.clone(),
        metadata: doc.metadata.clone(),
        created_at: ms_to_datetime(now),
        updated_at: ms_to_datetime(now),
    })
}

pub fn get_document(
    adapter: &SqliteAdapter,
    collection_name: &str,
    id: &str,
) -> RetrieveResult<Option<Document>> {
    let rows = adapter.select(
        &format!(
            "SELECT rowid, id, title, content, collection, metadata,
                    created_at, updated_at
             FROM docs_{collection_name} WHERE id = ?1"
        ),
        &[SqlValue::from(id)],
    )?;
    rows.first().map(parse_document_row).transpose()
}

/// Update a document in place. `rowid` stays stable; the FTS row is
/// rewritten and the vector row replaced (or dropped) in the same
/// transaction.
pub fn update_document(
    adapter: &SqliteAdapter,
    collection: &CollectionInfo,
    doc: &NewDocument,
) -> RetrieveResult<Document> {
    let id = doc.id.as_deref().ok_or(ValidationError::InvalidArgument {
        reason: "update requires a document id".to_string(),
    })?;
    if doc.content.is_empty() {
        return Err(ValidationError::EmptyContent.into());
    }
    if let Some(vector) = &doc.vector {
        check_dimensions(collection, vector)?;
    }

    let table = &collection.name;
    let existing = get_document(adapter, table, id)?.ok_or_else(|| {
        StorageError::DocumentNotFound {
            id: id.to_string(),
            collection: table.clone(),
        }
    })?;

    adapter.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> RetrieveResult<Document> {
        let now = datetime_to_ms(Utc::now());
        let metadata_text = doc
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).map_err(|e| to_storage_err(e.to_string())))
            .transpose()?;

        adapter.exec(
            &format!(
                "UPDATE docs_{table}
                 SET title = ?2, content = ?3, metadata = ?4, updated_at = ?5
                 WHERE id = ?1"
            ),
            &[
                SqlValue::from(id),
                SqlValue::from(doc.title.clone()),
                SqlValue::from(doc.content.clone()),
                SqlValue::from(metadata_text.clone()),
                SqlValue::Integer(now),
            ],
        )?;

        // External-content FTS: remove the old projection, index the new.
        let old_metadata_text = existing
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).map_err(|e| to_storage_err(e.to_string())))
            .transpose()?;
        delete_fts_row(
            adapter,
            table,
            existing.rowid,
            &existing.id,
            existing.title.as_deref(),
            &existing.content,
            old_metadata_text.as_deref(),
        )?;
        insert_fts_row(
            adapter,
            table,
            existing.rowid,
            id,
            doc.title.as_deref(),
            &doc.content,
            metadata_text.as_deref(),
        )?;

        if let Some(vector) = &doc.vector {
            insert_vector_row(adapter, table, existing.rowid, vector)?;
        }

        Ok(Document {
            id: id.to_string(),
            rowid: existing.rowid,
            title: doc.title.clone(),
            content: doc.content.clone(),
            collection: table.clone(),
            metadata: doc.metadata.clone(),
            created_at: existing.created_at,
            updated_at: ms_to_datetime(now),
        })
    })();

    match result {
        Ok(updated) => {
            adapter.execute_batch("COMMIT")?;
            Ok(updated)
        }
        Err(e) => {
            let _ = adapter.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Delete a document and its FTS/vector rows in one transaction.
pub fn delete_document(
    adapter: &SqliteAdapter,
    collection_name: &str,
    id: &str,
) -> RetrieveResult<()> {
    let existing = get_document(adapter, collection_name, id)?.ok_or_else(|| {
        StorageError::DocumentNotFound {
            id: id.to_string(),
            collection: collection_name.to_string(),
        }
    })?;
    let metadata_text = existing
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m).map_err(|e| to_storage_err(e.to_string())))
        .transpose()?;

    adapter.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> RetrieveResult<()> {
        delete_fts_row(
            adapter,
            collection_name,
            existing.rowid,
            &existing.id,
            existing.title.as_deref(),
            &existing.content,
            metadata_text.as_deref(),
        )?;
        delete_vector_row(adapter, collection_name, existing.rowid)?;
        adapter.exec(
            &format!("DELETE FROM docs_{collection_name} WHERE rowid = ?1"),
            &[SqlValue::Integer(existing.rowid)],
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            adapter.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = adapter.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

pub fn count_documents(adapter: &SqliteAdapter, collection_name: &str) -> RetrieveResult<u64> {
    Ok(adapter.query_i64(&format!("SELECT COUNT(*) FROM docs_{collection_name}"), &[])? as u64)
}

/// Store (or replace) the vector row for a document, validating the
/// collection's fixed dimensionality.
pub fn store_vector(
    adapter: &SqliteAdapter,
    collection: &CollectionInfo,
    rowid: i64,
    vector: &[f32],
) -> RetrieveResult<()> {
    check_dimensions(collection, vector)?;
    insert_vector_row(adapter, &collection.name, rowid, vector)
}

fn check_dimensions(collection: &CollectionInfo, vector: &[f32]) -> RetrieveResult<()> {
    if vector.len() != collection.embedding_dimensions {
        return Err(ValidationError::DimensionMismatch {
            expected: collection.embedding_dimensions,
            actual: vector.len(),
        }
        .into());
    }
    Ok(())
}

fn insert_fts_row(
    adapter: &SqliteAdapter,
    table: &str,
    rowid: i64,
    id: &str,
    title: Option<&str>,
    content: &str,
    metadata: Option<&str>,
) -> RetrieveResult<()> {
    adapter.exec(
        &format!(
            "INSERT INTO fts_{table}(rowid, id, title, content, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        &[
            SqlValue::Integer(rowid),
            SqlValue::from(id),
            SqlValue::from(title.map(str::to_string)),
            SqlValue::from(content),
            SqlValue::from(metadata.map(str::to_string)),
        ],
    )?;
    Ok(())
}

/// External-content FTS delete: the index is told the old column values via
/// the special 'delete' command.
fn delete_fts_row(
    adapter: &SqliteAdapter,
    table: &str,
    rowid: i64,
    id: &str,
    title: Option<&str>,
    content: &str,
    metadata: Option<&str>,
) -> RetrieveResult<()> {
    adapter.exec(
        &format!(
            "INSERT INTO fts_{table}(fts_{table}, rowid, id, title, content, metadata)
             VALUES ('delete', ?1, ?2, ?3, ?4, ?5)"
        ),
        &[
            SqlValue::Integer(rowid),
            SqlValue::from(id),
            SqlValue::from(title.map(str::to_string)),
            SqlValue::from(content),
            SqlValue::from(metadata.map(str::to_string)),
        ],
    )?;
    Ok(())
}

fn insert_vector_row(
    adapter: &SqliteAdapter,
    table: &str,
    rowid: i64,
    vector: &[f32],
) -> RetrieveResult<()> {
    delete_vector_row(adapter, table, rowid)?;
    adapter.exec(
        &format!("INSERT INTO vec_{table}_dense(rowid, embedding) VALUES (?1, ?2)"),
        &[
            SqlValue::Integer(rowid),
            SqlValue::Blob(vector_to_blob(vector)),
        ],
    )?;
    Ok(())
}

fn delete_vector_row(adapter: &SqliteAdapter, table: &str, rowid: i64) -> RetrieveResult<()> {
    adapter.exec(
        &format!("DELETE FROM vec_{table}_dense WHERE rowid = ?1"),
        &[SqlValue::Integer(rowid)],
    )?;
    Ok(())
}

pub(crate) fn parse_document_row(row: &Row) -> RetrieveResult<Document> {
    let text = |key: &str| -> RetrieveResult<String> {
        row.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| to_storage_err(format!("docs.{key}: expected text")))
    };
    let int = |key: &str| -> RetrieveResult<i64> {
        row.get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| to_storage_err(format!("docs.{key}: expected integer")))
    };

    let metadata = row
        .get("metadata")
        .and_then(|v| v.as_str())
        .map(|text| {
            serde_json::from_str(text).map_err(|e| to_storage_err(format!("docs.metadata: {e}")))
        })
        .transpose()?;

    Ok(Document {
        id: text("id")?,
        rowid: int("rowid")?,
        title: row
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        content: text("content")?,
        collection: text("collection")?,
        metadata,
        created_at: ms_to_datetime(int("created_at")?),
        updated_at: ms_to_datetime(int("updated_at")?),
    })
}
