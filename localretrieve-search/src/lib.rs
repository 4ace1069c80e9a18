//! # localretrieve-search
//!
//! Compiles search requests into SQL over the storage layer, executes
//! keyword (BM25), vector (cosine), and hybrid modes, and fuses ranked
//! lists with RRF or normalized weighting.

pub mod engine;
pub mod fusion;
pub mod global;
pub mod sql;

pub use engine::SearchEngine;

use localretrieve_core::errors::{RetrieveError, StorageError};

/// Malformed result rows surface as engine errors with a search context.
pub(crate) fn to_search_err(message: impl Into<String>) -> RetrieveError {
    StorageError::Sqlite {
        message: format!("search: {}", message.into()),
    }
    .into()
}
