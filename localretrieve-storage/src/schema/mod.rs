//! Schema manager: creation, validation, and version gating of the
//! canonical table set.
//!
//! Schema v3: `collections` registry, per-collection `docs_<c>` /
//! `fts_<c>` / `vec_<c>_dense` triples, `embedding_queue`, and the
//! `embedding_cache` tier.

use tracing::{info, warn};

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::constants::{
    CURRENT_SCHEMA_VERSION, DEFAULT_COLLECTION, MAX_COLLECTION_NAME_LEN,
    MIN_SUPPORTED_SCHEMA_VERSION,
};
use localretrieve_core::errors::{RetrieveResult, StorageError, ValidationError};

use crate::adapter::{SqlValue, SqliteAdapter};
use crate::queries::collection_ops;

/// Tables that must all exist for a v3 installation to be considered
/// complete. Virtual tables listed first: they must be dropped first when
/// recovering a partial installation.
const REQUIRED_VIRTUAL_TABLES: [&str; 2] = ["fts_default", "vec_default_dense"];
const REQUIRED_REGULAR_TABLES: [&str; 4] = [
    "collections",
    "docs_default",
    "embedding_queue",
    "embedding_cache",
];

/// Initialization protocol:
/// 1. Read the stored schema version (absent ⇒ 0).
/// 2. Complete current installation ⇒ ensure the `default` row and stop.
/// 3. Partial installation ⇒ drop the partial set and recreate.
/// 4. Version below the minimum supported ⇒ fatal, user must
///    export/clear/reimport.
pub fn initialize(adapter: &SqliteAdapter, config: &RetrieveConfig) -> RetrieveResult<()> {
    let present = present_tables(adapter)?;
    let total = REQUIRED_VIRTUAL_TABLES.len() + REQUIRED_REGULAR_TABLES.len();

    if present.len() == total {
        let version = read_schema_version(adapter)?;
        if version != 0 && version < MIN_SUPPORTED_SCHEMA_VERSION {
            return Err(StorageError::SchemaVersionTooOld {
                found: version,
                minimum: MIN_SUPPORTED_SCHEMA_VERSION,
            }
            .into());
        }
        collection_ops::ensure_default_row(adapter, config.embedding.dimensions)?;
        return Ok(());
    }

    if !present.is_empty() {
        // A prior installation died partway through. Start over.
        warn!(
            present = present.len(),
            required = total,
            "incomplete schema installation detected, recreating"
        );
        drop_partial(adapter)?;
    }

    create_base_schema(adapter, config)?;
    collection_ops::ensure_default_row(adapter, config.embedding.dimensions)?;
    info!(version = CURRENT_SCHEMA_VERSION, "schema initialized");
    Ok(())
}

/// Read the highest schema version recorded in the registry; 0 when the
/// registry is absent or empty.
pub fn read_schema_version(adapter: &SqliteAdapter) -> RetrieveResult<u32> {
    if !table_exists(adapter, "collections")? {
        return Ok(0);
    }
    let rows = adapter.select("SELECT MAX(schema_version) AS v FROM collections", &[])?;
    Ok(rows
        .first()
        .and_then(|row| row.get("v"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as u32)
}

fn present_tables(adapter: &SqliteAdapter) -> RetrieveResult<Vec<String>> {
    let mut present = Vec::new();
    for name in REQUIRED_VIRTUAL_TABLES
        .iter()
        .chain(REQUIRED_REGULAR_TABLES.iter())
    {
        if table_exists(adapter, name)? {
            present.push((*name).to_string());
        }
    }
    Ok(present)
}

pub fn table_exists(adapter: &SqliteAdapter, name: &str) -> RetrieveResult<bool> {
    let count = adapter.query_i64(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        &[SqlValue::from(name)],
    )?;
    Ok(count > 0)
}

/// Drop whatever survives of a partial installation, virtual tables first.
fn drop_partial(adapter: &SqliteAdapter) -> RetrieveResult<()> {
    for name in REQUIRED_VIRTUAL_TABLES {
        adapter.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))?;
    }
    for name in REQUIRED_REGULAR_TABLES {
        adapter.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))?;
    }
    Ok(())
}

fn create_base_schema(adapter: &SqliteAdapter, config: &RetrieveConfig) -> RetrieveResult<()> {
    adapter.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS collections (
            name                 TEXT PRIMARY KEY,
            created_at           INTEGER NOT NULL,
            updated_at           INTEGER NOT NULL,
            schema_version       INTEGER NOT NULL,
            config               TEXT NOT NULL DEFAULT '{}',
            embedding_provider   TEXT,
            embedding_dimensions INTEGER NOT NULL DEFAULT 384,
            embedding_status     TEXT NOT NULL DEFAULT 'disabled'
                CHECK (embedding_status IN ('enabled','disabled','pending')),
            processing_status    TEXT NOT NULL DEFAULT 'idle'
                CHECK (processing_status IN ('idle','processing','error'))
        );

        CREATE TABLE IF NOT EXISTS embedding_queue (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_name TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
            document_id     TEXT NOT NULL,
            text_content    TEXT NOT NULL,
            priority        INTEGER NOT NULL DEFAULT 2,
            status          TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','processing','completed','failed')),
            retry_count     INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL,
            started_at      INTEGER,
            completed_at    INTEGER,
            processed_at    INTEGER,
            error_message   TEXT,
            UNIQUE (collection_name, document_id)
        );

        CREATE INDEX IF NOT EXISTS idx_queue_status ON embedding_queue(status);
        CREATE INDEX IF NOT EXISTS idx_queue_collection ON embedding_queue(collection_name);
        CREATE INDEX IF NOT EXISTS idx_queue_priority
            ON embedding_queue(priority DESC, created_at);

        CREATE TABLE IF NOT EXISTS embedding_cache (
            collection  TEXT NOT NULL,
            text_hash   TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            dimensions  INTEGER NOT NULL,
            created_at  INTEGER NOT NULL,
            expires_at  INTEGER NOT NULL,
            PRIMARY KEY (collection, text_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_embedding_cache_expiry
            ON embedding_cache(expires_at);
        ",
    )?;

    create_collection_tables(
        adapter,
        DEFAULT_COLLECTION,
        config.embedding.dimensions,
        &config.fts.tokenizer,
    )?;
    Ok(())
}

/// Create the `docs_<c>` / `fts_<c>` / `vec_<c>_dense` triple for a
/// collection. The name has already passed [`validate_collection_name`], so
/// interpolating it into DDL is safe.
pub fn create_collection_tables(
    adapter: &SqliteAdapter,
    name: &str,
    dimensions: usize,
    tokenizer: &str,
) -> RetrieveResult<()> {
    validate_collection_name(name)?;
    adapter.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS docs_{name} (
            rowid      INTEGER PRIMARY KEY AUTOINCREMENT,
            id         TEXT NOT NULL UNIQUE,
            title      TEXT,
            content    TEXT NOT NULL,
            collection TEXT NOT NULL,
            metadata   TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_docs_{name}_collection
            ON docs_{name}(collection);

        CREATE VIRTUAL TABLE IF NOT EXISTS fts_{name} USING fts5(
            id, title, content, metadata,
            content='docs_{name}', content_rowid='rowid',
            tokenize='{tokenizer}'
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS vec_{name}_dense
            USING vec0(embedding float[{dimensions}] distance_metric=cosine);
        "
    ))
}

/// Drop a collection's triple, virtual tables first.
pub fn drop_collection_tables(adapter: &SqliteAdapter, name: &str) -> RetrieveResult<()> {
    validate_collection_name(name)?;
    adapter.execute_batch(&format!(
        "
        DROP TABLE IF EXISTS fts_{name};
        DROP TABLE IF EXISTS vec_{name}_dense;
        DROP TABLE IF EXISTS docs_{name};
        "
    ))
}

/// Collection names become part of table names, so they are restricted to
/// schema-safe identifiers: `[a-z][a-z0-9_]*`, bounded length.
pub fn validate_collection_name(name: &str) -> RetrieveResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidCollectionName {
            name: name.to_string(),
            max: MAX_COLLECTION_NAME_LEN,
        }
        .into())
    }
}
