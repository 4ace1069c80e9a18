//! # localretrieve-core
//!
//! Foundation crate for the LocalRetrieve hybrid retrieval engine.
//! Defines all shared types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::RetrieveConfig;
pub use errors::{ErrorKind, RetrieveError, RetrieveResult, Severity};
pub use models::{
    CollectionInfo, Document, ProcessResult, QueueItem, QueuePriority, SearchRequest,
    SearchResponse,
};
