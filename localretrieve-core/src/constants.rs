/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Oldest schema version this build will open. Anything older requires a
/// user-driven export/clear/reimport.
pub const MIN_SUPPORTED_SCHEMA_VERSION: u32 = 3;

/// Name of the collection that always exists.
pub const DEFAULT_COLLECTION: &str = "default";

/// Embedding dimensionality used when a collection does not specify one.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Maximum characters accepted for any single text parameter at the RPC
/// boundary.
pub const MAX_TEXT_PARAM_CHARS: usize = 100_000;

/// Maximum bytes accepted for any single blob parameter at the RPC boundary.
pub const MAX_BLOB_PARAM_BYTES: usize = 10 * 1024 * 1024;

/// Maximum length of a collection name (it becomes part of table names).
pub const MAX_COLLECTION_NAME_LEN: usize = 48;

/// Sub-batch bounds for adaptive bulk insert.
pub const MIN_SUB_BATCH: usize = 5;
pub const MAX_SUB_BATCH: usize = 50;

/// FTS index overhead multiplier used when estimating per-document commit
/// cost (index construction is deferred to COMMIT).
pub const FTS_OVERHEAD_MULTIPLIER: usize = 4;
