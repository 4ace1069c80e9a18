use super::Severity;

/// Storage-layer errors for SQL engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQL error: {message}")]
    Sqlite { message: String },

    #[error("database is busy: {message}")]
    Busy { message: String },

    #[error("database corruption detected: {details}")]
    Corruption { details: String },

    #[error("disk full: {message}")]
    DiskFull { message: String },

    #[error("schema version {found} is below the minimum supported version {minimum}")]
    SchemaVersionTooOld { found: u32, minimum: u32 },

    #[error("incomplete schema installation, missing: {missing}")]
    PartialSchema { missing: String },

    #[error("document '{id}' not found in collection '{collection}'")]
    DocumentNotFound { id: String, collection: String },

    #[error("collection '{name}' not found")]
    CollectionNotFound { name: String },

    #[error("bulk insert failed after {committed_sub_batches} committed sub-batches ({committed_docs} documents): {reason}")]
    BulkInsertFailed {
        committed_sub_batches: usize,
        committed_docs: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Corruption { .. } => Severity::Critical,
            Self::DiskFull { .. } | Self::SchemaVersionTooOld { .. } => Severity::High,
            Self::Busy { .. } | Self::Sqlite { .. } | Self::PartialSchema { .. } => {
                Severity::Medium
            }
            Self::BulkInsertFailed { .. } => Severity::Medium,
            Self::DocumentNotFound { .. } | Self::CollectionNotFound { .. } => Severity::Low,
        }
    }

    /// Only transient conditions are recoverable by retrying.
    pub fn recoverable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "retry the operation",
            Self::DiskFull { .. } => "free disk space or export data",
            Self::SchemaVersionTooOld { .. } => {
                "export the database, clear storage, and re-import"
            }
            Self::Corruption { .. } => "clear storage and restore from an export",
            _ => "check the request and try again",
        }
    }
}
