//! Background embedding queue queries.
//!
//! State machine per row: pending → processing → (completed | failed |
//! back to pending for retry).

use chrono::Utc;

use localretrieve_core::errors::RetrieveResult;
use localretrieve_core::models::{
    QueueItem, QueueItemStatus, QueuePriority, QueuePurgeFilter, QueueStatus,
};

use super::{datetime_to_ms, ms_to_datetime};
use crate::adapter::{Row, SqlValue, SqliteAdapter};
use crate::to_storage_err;

/// Enqueue a document for embedding. Upserts on `(collection, document_id)`:
/// re-enqueueing replaces prior state and resets retries.
pub fn enqueue(
    adapter: &SqliteAdapter,
    collection: &str,
    document_id: &str,
    text_content: &str,
    priority: QueuePriority,
) -> RetrieveResult<i64> {
    let now = datetime_to_ms(Utc::now());
    adapter.exec(
        "INSERT INTO embedding_queue
            (collection_name, document_id, text_content, priority, status,
             retry_count, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)
         ON CONFLICT (collection_name, document_id) DO UPDATE SET
            text_content = excluded.text_content,
            priority = excluded.priority,
            status = 'pending',
            retry_count = 0,
            created_at = excluded.created_at,
            started_at = NULL,
            completed_at = NULL,
            processed_at = NULL,
            error_message = NULL",
        &[
            SqlValue::from(collection),
            SqlValue::from(document_id),
            SqlValue::from(text_content),
            SqlValue::Integer(priority.as_i64()),
            SqlValue::Integer(now),
        ],
    )?;
    adapter.query_i64(
        "SELECT id FROM embedding_queue WHERE collection_name = ?1 AND document_id = ?2",
        &[SqlValue::from(collection), SqlValue::from(document_id)],
    )
}

/// Fetch up to `batch_size` pending items, highest priority first, oldest
/// first within a priority.
pub fn fetch_pending(
    adapter: &SqliteAdapter,
    collection: Option<&str>,
    batch_size: usize,
) -> RetrieveResult<Vec<QueueItem>> {
    let (sql, params): (String, Vec<SqlValue>) = match collection {
        Some(c) => (
            format!("{SELECT_ITEM} WHERE status = 'pending' AND collection_name = ?1 ORDER BY priority ASC, created_at ASC LIMIT ?2"),
            vec![SqlValue::from(c), SqlValue::Integer(batch_size as i64)],
        ),
        None => (
            format!("{SELECT_ITEM} WHERE status = 'pending' ORDER BY priority ASC, created_at ASC LIMIT ?1"),
            vec![SqlValue::Integer(batch_size as i64)],
        ),
    };
    let rows = adapter.select(&sql, &params)?;
    rows.iter().map(parse_queue_row).collect()
}

const SELECT_ITEM: &str = "SELECT id, collection_name, document_id, text_content, priority,
        status, retry_count, created_at, started_at, completed_at, error_message
 FROM embedding_queue";

pub fn mark_processing(adapter: &SqliteAdapter, id: i64) -> RetrieveResult<()> {
    adapter.exec(
        "UPDATE embedding_queue SET status = 'processing', started_at = ?2 WHERE id = ?1",
        &[
            SqlValue::Integer(id),
            SqlValue::Integer(datetime_to_ms(Utc::now())),
        ],
    )?;
    Ok(())
}

pub fn mark_completed(adapter: &SqliteAdapter, id: i64) -> RetrieveResult<()> {
    let now = datetime_to_ms(Utc::now());
    adapter.exec(
        "UPDATE embedding_queue
         SET status = 'completed', completed_at = ?2, processed_at = ?2, error_message = NULL
         WHERE id = ?1",
        &[SqlValue::Integer(id), SqlValue::Integer(now)],
    )?;
    Ok(())
}

/// Record a failed attempt: back to pending while retries remain, failed
/// once exhausted. Returns the resulting status.
pub fn mark_failed_attempt(
    adapter: &SqliteAdapter,
    id: i64,
    error: &str,
    max_retries: u32,
) -> RetrieveResult<QueueItemStatus> {
    let retry_count = adapter.query_i64(
        "SELECT retry_count FROM embedding_queue WHERE id = ?1",
        &[SqlValue::Integer(id)],
    )? as u32;

    if retry_count < max_retries {
        adapter.exec(
            "UPDATE embedding_queue
             SET status = 'pending', retry_count = retry_count + 1,
                 error_message = ?2, started_at = NULL
             WHERE id = ?1",
            &[SqlValue::Integer(id), SqlValue::from(error)],
        )?;
        Ok(QueueItemStatus::Pending)
    } else {
        adapter.exec(
            "UPDATE embedding_queue
             SET status = 'failed', error_message = ?2, completed_at = ?3
             WHERE id = ?1",
            &[
                SqlValue::Integer(id),
                SqlValue::from(error),
                SqlValue::Integer(datetime_to_ms(Utc::now())),
            ],
        )?;
        Ok(QueueItemStatus::Failed)
    }
}

/// Return stranded `processing` rows to `pending`. Run before each
/// processing pass so a crashed pass never wedges items.
pub fn requeue_processing(adapter: &SqliteAdapter, collection: Option<&str>) -> RetrieveResult<usize> {
    let count = match collection {
        Some(c) => adapter.exec(
            "UPDATE embedding_queue SET status = 'pending', started_at = NULL
             WHERE status = 'processing' AND collection_name = ?1",
            &[SqlValue::from(c)],
        )?,
        None => adapter.exec(
            "UPDATE embedding_queue SET status = 'pending', started_at = NULL
             WHERE status = 'processing'",
            &[],
        )?,
    };
    Ok(count)
}

pub fn counts(adapter: &SqliteAdapter, collection: Option<&str>) -> RetrieveResult<QueueStatus> {
    let (sql, params): (&str, Vec<SqlValue>) = match collection {
        Some(c) => (
            "SELECT status, COUNT(*) AS n FROM embedding_queue
             WHERE collection_name = ?1 GROUP BY status",
            vec![SqlValue::from(c)],
        ),
        None => (
            "SELECT status, COUNT(*) AS n FROM embedding_queue GROUP BY status",
            vec![],
        ),
    };
    let rows = adapter.select(sql, &params)?;
    let mut status = QueueStatus::default();
    for row in &rows {
        let n = row.get("n").and_then(|v| v.as_i64()).unwrap_or(0) as usize;
        match row.get("status").and_then(|v| v.as_str()) {
            Some("pending") => status.pending = n,
            Some("processing") => status.processing = n,
            Some("completed") => status.completed = n,
            Some("failed") => status.failed = n,
            _ => {}
        }
    }
    Ok(status)
}

/// Purge queue rows matching the filter; an empty filter purges everything.
pub fn purge(adapter: &SqliteAdapter, filter: &QueuePurgeFilter) -> RetrieveResult<usize> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    if let Some(collection) = &filter.collection {
        params.push(SqlValue::from(collection.as_str()));
        clauses.push(format!("collection_name = ?{}", params.len()));
    }
    if let Some(status) = filter.status {
        params.push(SqlValue::from(status.as_str()));
        clauses.push(format!("status = ?{}", params.len()));
    }
    if let Some(before) = filter.completed_before {
        params.push(SqlValue::Integer(datetime_to_ms(before)));
        clauses.push(format!(
            "status = 'completed' AND completed_at < ?{}",
            params.len()
        ));
    }
    let sql = if clauses.is_empty() {
        "DELETE FROM embedding_queue".to_string()
    } else {
        format!("DELETE FROM embedding_queue WHERE {}", clauses.join(" AND "))
    };
    adapter.exec(&sql, &params)
}

fn parse_queue_row(row: &Row) -> RetrieveResult<QueueItem> {
    let text = |key: &str| -> RetrieveResult<String> {
        row.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| to_storage_err(format!("embedding_queue.{key}: expected text")))
    };
    let int = |key: &str| -> RetrieveResult<i64> {
        row.get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| to_storage_err(format!("embedding_queue.{key}: expected integer")))
    };
    let opt_ms = |key: &str| {
        row.get(key)
            .and_then(|v| v.as_i64())
            .map(ms_to_datetime)
    };

    let status_text = text("status")?;
    let status = QueueItemStatus::parse(&status_text)
        .ok_or_else(|| to_storage_err(format!("bad queue status '{status_text}'")))?;

    Ok(QueueItem {
        id: int("id")?,
        collection: text("collection_name")?,
        document_id: text("document_id")?,
        text_content: text("text_content")?,
        priority: QueuePriority::from_i64(int("priority")?),
        status,
        retry_count: int("retry_count")? as u32,
        created_at: ms_to_datetime(int("created_at")?),
        started_at: opt_ms("started_at"),
        completed_at: opt_ms("completed_at"),
        error_message: row
            .get("error_message")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}
