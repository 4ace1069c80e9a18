//! Error taxonomy for the whole engine.
//!
//! One typed error per subsystem, all wrapped by [`RetrieveError`]. The RPC
//! boundary maps these onto the wire envelope via `kind`/`severity`/
//! `recoverable`/`suggested_action`.

mod embedding_error;
mod llm_error;
mod persistence_error;
mod storage_error;
mod validation_error;
mod vector_error;

pub use embedding_error::EmbeddingError;
pub use llm_error::LlmError;
pub use persistence_error::PersistenceError;
pub use storage_error::StorageError;
pub use validation_error::ValidationError;
pub use vector_error::VectorError;

/// Convenience result alias used across the workspace.
pub type RetrieveResult<T> = Result<T, RetrieveError>;

/// Error category, mirrored as the `kind` field of the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Vector,
    Persistence,
    Embedding,
    Llm,
    Validation,
    Network,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Vector => "vector",
            Self::Persistence => "persistence",
            Self::Embedding => "embedding",
            Self::Llm => "llm",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Timeout => "timeout",
        }
    }
}

/// How bad it is. Drives the user-facing message tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Top-level error wrapping every subsystem error.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("operation '{operation}' timed out after {ms}ms")]
    Timeout { operation: String, ms: u64 },
}

impl RetrieveError {
    /// The envelope category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::Database,
            Self::Vector(_) => ErrorKind::Vector,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::Llm(LlmError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Llm(_) => ErrorKind::Llm,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Storage(e) => e.severity(),
            Self::Vector(_) => Severity::High,
            Self::Persistence(e) => e.severity(),
            Self::Embedding(_) => Severity::Medium,
            Self::Llm(_) => Severity::Medium,
            Self::Validation(_) => Severity::Low,
            Self::Network { .. } => Severity::Medium,
            Self::Timeout { .. } => Severity::Medium,
        }
    }

    /// Whether retrying (or a simple recovery step) can succeed without the
    /// caller changing anything.
    pub fn recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.recoverable(),
            Self::Vector(_) => false,
            Self::Persistence(e) => e.recoverable(),
            Self::Embedding(_) => true,
            Self::Llm(e) => e.retryable(),
            Self::Validation(_) => false,
            Self::Network { .. } => true,
            Self::Timeout { .. } => true,
        }
    }

    /// One actionable suggestion, derived from category + severity.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.suggested_action(),
            Self::Vector(_) => "rebuild the database with the vector extension available",
            Self::Persistence(e) => e.suggested_action(),
            Self::Embedding(_) => "retry, or switch the collection to another embedding provider",
            Self::Llm(e) => e.suggested_action(),
            Self::Validation(_) => "fix the request input and try again",
            Self::Network { .. } => "check connectivity and retry",
            Self::Timeout { .. } => "retry, or raise the operation timeout",
        }
    }

    /// Short message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Database => "A database operation failed.".to_string(),
            ErrorKind::Vector => "Vector search is unavailable.".to_string(),
            ErrorKind::Persistence => "Saving or loading the database failed.".to_string(),
            ErrorKind::Embedding => "Embedding generation failed.".to_string(),
            ErrorKind::Llm => "The language-model request failed.".to_string(),
            ErrorKind::Validation => format!("Invalid request: {self}"),
            ErrorKind::Network => "A network request failed.".to_string(),
            ErrorKind::Timeout => "The operation timed out.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_recoverable() {
        let err = RetrieveError::from(ValidationError::EmptyQuery);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.recoverable());
        assert_eq!(err.severity(), Severity::Low);
    }

    #[test]
    fn busy_database_is_transient() {
        let err = RetrieveError::from(StorageError::Busy {
            message: "database is locked".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Database);
        assert!(err.recoverable());
        assert_eq!(err.severity(), Severity::Medium);
    }

    #[test]
    fn corruption_is_critical() {
        let err = RetrieveError::from(StorageError::Corruption {
            details: "page checksum".to_string(),
        });
        assert_eq!(err.severity(), Severity::Critical);
        assert!(!err.recoverable());
    }

    #[test]
    fn llm_timeout_maps_to_timeout_kind() {
        let err = RetrieveError::from(LlmError::Timeout { ms: 10_000 });
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn quota_error_carries_actionable_hint() {
        let err = RetrieveError::from(PersistenceError::QuotaExceeded {
            needed: 100,
            available: 10,
        });
        assert!(err.suggested_action().contains("export"));
        assert!(err.recoverable());
    }
}
