//! # localretrieve-storage
//!
//! SQLite persistence layer for LocalRetrieve: the SQL engine adapter
//! (FTS5 + vec0 virtual tables), the durability manager mapping `opfs:`
//! logical paths to snapshot files, the schema manager, and the query
//! modules the higher layers build on.

pub mod adapter;
pub mod durability;
pub mod engine;
pub mod queries;
pub mod schema;

pub use adapter::{SqlValue, SqliteAdapter};
pub use durability::DurabilityManager;
pub use engine::StorageEngine;

use localretrieve_core::errors::{RetrieveError, StorageError};

/// Map a rusqlite error onto the storage taxonomy, classifying transient
/// and fatal engine conditions.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> RetrieveError {
    if let rusqlite::Error::SqliteFailure(ffi_err, ref msg) = e {
        let message = msg.clone().unwrap_or_else(|| ffi_err.to_string());
        let mapped = match ffi_err.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                StorageError::Busy { message }
            }
            rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                StorageError::Corruption { details: message }
            }
            rusqlite::ErrorCode::DiskFull => StorageError::DiskFull { message },
            _ => StorageError::Sqlite { message },
        };
        return mapped.into();
    }
    StorageError::Sqlite {
        message: e.to_string(),
    }
    .into()
}

/// Shorthand for wrapping a plain message as a storage error.
pub(crate) fn to_storage_err(message: impl Into<String>) -> RetrieveError {
    StorageError::Sqlite {
        message: message.into(),
    }
    .into()
}
