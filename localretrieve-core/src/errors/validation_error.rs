/// Input validation errors. Fixed by correcting the input, never by retry.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("query must contain text or a vector")]
    EmptyQuery,

    #[error("document content must be non-empty")]
    EmptyContent,

    #[error("SQL contains non-ASCII text but no bound parameters; bind text as parameters")]
    NonAsciiSqlWithoutParams,

    #[error("invalid collection name '{name}': use [a-z][a-z0-9_]*, max {max} chars")]
    InvalidCollectionName { name: String, max: usize },

    #[error("collection '{name}' already exists")]
    CollectionExists { name: String },

    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("text parameter of {len} chars exceeds the {max} char limit")]
    TextTooLarge { len: usize, max: usize },

    #[error("blob parameter of {len} bytes exceeds the {max} byte limit")]
    BlobTooLarge { len: usize, max: usize },

    #[error("unknown method '{method}'")]
    MethodNotFound { method: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },
}
