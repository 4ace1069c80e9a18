/// Embedding-pipeline errors. Recoverable by retry or provider switch.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("failed to load model from '{path}': {reason}")]
    ModelLoadFailed { path: String, reason: String },

    #[error("inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("provider '{provider}' returned {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("embedding generation timed out after {ms}ms")]
    GenerationTimeout { ms: u64 },

    #[error("embedding generation is disabled for collection '{collection}'")]
    Disabled { collection: String },
}
