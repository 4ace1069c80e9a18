/// Vector-extension errors. None of these are recoverable without a rebuild.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("vector extension unavailable: {reason}")]
    ExtensionUnavailable { reason: String },

    #[error("vector table '{table}' failed: {reason}")]
    TableFailed { table: String, reason: String },
}
