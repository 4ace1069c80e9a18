//! SQL engine adapter: a thin wrapper over SQLite with FTS5 and the
//! `vec0` vector virtual-table extension.
//!
//! The live database is always an in-memory image; the durability manager
//! loads and snapshots it as whole images.

pub mod pragmas;
mod value;

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::Connection;
use tracing::debug;

use localretrieve_core::config::SqlConfig;
use localretrieve_core::errors::{PersistenceError, RetrieveResult, ValidationError, VectorError};

pub use value::{blob_to_vector, vector_to_blob, Row, SqlValue};

use crate::map_sqlite_err;

static VEC_EXTENSION: Once = Once::new();

/// Register sqlite-vec as an auto extension so every subsequently opened
/// connection has the `vec0` module. Process-wide, idempotent.
fn register_vec_extension() {
    VEC_EXTENSION.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Wrapper over the embedded SQL engine.
#[derive(Debug)]
pub struct SqliteAdapter {
    conn: Connection,
    config: SqlConfig,
}

impl SqliteAdapter {
    /// Open a fresh in-memory database with the vector extension registered
    /// and all pragmas applied.
    pub fn open_in_memory(config: &SqlConfig) -> RetrieveResult<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        pragmas::apply_pragmas(&conn, config)?;
        let adapter = Self {
            conn,
            config: config.clone(),
        };
        adapter.init_vector_extension()?;
        Ok(adapter)
    }

    /// Verify the vector extension is actually usable. Fatal at startup if
    /// it is not: vector tables in a restored image would be unreadable.
    pub fn init_vector_extension(&self) -> RetrieveResult<()> {
        let version: String = self
            .conn
            .query_row("SELECT vec_version()", [], |row| row.get(0))
            .map_err(|e| VectorError::ExtensionUnavailable {
                reason: e.to_string(),
            })?;
        debug!(version = %version, "vector extension ready");
        Ok(())
    }

    /// Run a statement that returns no rows.
    ///
    /// Refuses SQL containing non-ASCII codepoints when no parameters are
    /// bound: user text must always travel as a parameter, never be
    /// interpolated into the statement.
    pub fn exec(&self, sql: &str, params: &[SqlValue]) -> RetrieveResult<usize> {
        ensure_params_for_non_ascii(sql, params)?;
        self.conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(map_sqlite_err)
    }

    /// Run a batch of ASCII DDL/utility statements.
    pub fn execute_batch(&self, sql: &str) -> RetrieveResult<()> {
        self.conn.execute_batch(sql).map_err(map_sqlite_err)
    }

    /// Run a query, returning each row as a column-name → value map.
    pub fn select(&self, sql: &str, params: &[SqlValue]) -> RetrieveResult<Vec<Row>> {
        ensure_params_for_non_ascii(sql, params)?;
        let mut stmt = self.conn.prepare(sql).map_err(map_sqlite_err)?;
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(map_sqlite_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqlite_err)? {
            let mut mapped = Row::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = match row.get_ref(i).map_err(map_sqlite_err)? {
                    rusqlite::types::ValueRef::Null => SqlValue::Null,
                    rusqlite::types::ValueRef::Integer(v) => SqlValue::Integer(v),
                    rusqlite::types::ValueRef::Real(v) => SqlValue::Real(v),
                    rusqlite::types::ValueRef::Text(bytes) => SqlValue::Text(
                        String::from_utf8_lossy(bytes).into_owned(),
                    ),
                    rusqlite::types::ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
                };
                mapped.insert(name.clone(), value);
            }
            out.push(mapped);
        }
        Ok(out)
    }

    /// Query a single i64 scalar.
    pub fn query_i64(&self, sql: &str, params: &[SqlValue]) -> RetrieveResult<i64> {
        ensure_params_for_non_ascii(sql, params)?;
        self.conn
            .query_row(sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get(0)
            })
            .map_err(map_sqlite_err)
    }

    /// Produce a whole-database image in the engine's on-disk format.
    ///
    /// Goes through a scratch file with the online-backup API: the live
    /// database is in-memory, so the image has to be materialized.
    pub fn serialize(&self) -> RetrieveResult<Vec<u8>> {
        let scratch = scratch_path();
        let result = self.save_image_to(&scratch).and_then(|()| {
            std::fs::read(&scratch).map_err(|e| {
                PersistenceError::SaveFailed {
                    path: scratch.display().to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
        });
        let _ = std::fs::remove_file(&scratch);
        result
    }

    /// Replace the live image with the given serialized database.
    pub fn deserialize(&mut self, bytes: &[u8]) -> RetrieveResult<()> {
        let scratch = scratch_path();
        std::fs::write(&scratch, bytes).map_err(|e| PersistenceError::LoadFailed {
            path: scratch.display().to_string(),
            reason: e.to_string(),
        })?;
        let result = self.load_image_from(&scratch);
        let _ = std::fs::remove_file(&scratch);
        result
    }

    /// Copy the live database into a file at `path` (overwriting it).
    pub fn save_image_to(&self, path: &Path) -> RetrieveResult<()> {
        let mut dst = Connection::open(path).map_err(|e| PersistenceError::SaveFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let backup =
            Backup::new(&self.conn, &mut dst).map_err(|e| PersistenceError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        backup
            .run_to_completion(100, Duration::from_millis(0), None)
            .map_err(|e| PersistenceError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Replace the live database with the image stored at `path`.
    ///
    /// A truncated or non-database file fails with `CorruptImage`, which is
    /// fatal at startup.
    pub fn load_image_from(&mut self, path: &Path) -> RetrieveResult<()> {
        let src = Connection::open(path).map_err(|e| PersistenceError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        // A quick integrity probe: reading the schema version forces SQLite
        // to parse the header of the source file.
        src.pragma_query_value(None, "schema_version", |row| row.get::<_, i64>(0))
            .map_err(|e| PersistenceError::CorruptImage {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let backup =
            Backup::new(&src, &mut self.conn).map_err(|e| PersistenceError::CorruptImage {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        backup
            .run_to_completion(100, Duration::from_millis(0), None)
            .map_err(|e| PersistenceError::CorruptImage {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        drop(backup);
        // The restored image resets per-connection pragmas applied to the
        // destination; re-apply.
        pragmas::apply_pragmas(&self.conn, &self.config)?;
        Ok(())
    }

    /// Current image size in bytes.
    pub fn image_size(&self) -> RetrieveResult<u64> {
        pragmas::image_size(&self.conn)
    }
}

/// The parameter-binding correctness invariant: any non-ASCII text reaching
/// the engine must arrive as a bound parameter.
fn ensure_params_for_non_ascii(sql: &str, params: &[SqlValue]) -> RetrieveResult<()> {
    if params.is_empty() && !sql.is_ascii() {
        return Err(ValidationError::NonAsciiSqlWithoutParams.into());
    }
    Ok(())
}

fn scratch_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("localretrieve-{}.image", uuid::Uuid::new_v4()))
}
