//! Typed request/response messages crossing the worker boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use localretrieve_core::errors::RetrieveError;
use localretrieve_core::models::{
    NewDocument, QueuePriority, QueuePurgeFilter, SearchRequest,
};
use localretrieve_llm::LlmCallOptions;
use localretrieve_storage::SqlValue;

/// A bindable parameter as it crosses the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ParamValue {
    pub fn into_sql_value(self) -> SqlValue {
        match self {
            Self::Null => SqlValue::Null,
            Self::Integer(v) => SqlValue::Integer(v),
            Self::Real(v) => SqlValue::Real(v),
            Self::Text(s) => SqlValue::Text(s),
            Self::Blob(b) => SqlValue::Blob(b),
        }
    }
}

/// Orchestrated search + optional LLM assistance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchWithLlmRequest {
    pub search: SearchRequest,
    #[serde(default)]
    pub enhance_query: bool,
    #[serde(default)]
    pub summarize_results: bool,
    pub llm: LlmCallOptions,
}

/// Every operation the worker serves. Unknown operations never reach this
/// enum: hosts speaking JSON get `MethodNotFound` from the deserializer
/// wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    // Lifecycle
    Open { path: String },
    Close,
    Ping,
    GetVersion,
    GetStats,

    // Raw SQL surface
    Exec { sql: String, #[serde(default)] params: Vec<ParamValue> },
    Select { sql: String, #[serde(default)] params: Vec<ParamValue> },
    BulkInsert { sql: String, rows: Vec<Vec<ParamValue>> },
    InitVecExtension,
    InitializeSchema,

    // Collections
    CreateCollection {
        name: String,
        dimensions: Option<usize>,
        provider: Option<String>,
        config: Option<serde_json::Value>,
    },
    ListCollections,
    GetCollectionInfo { name: String },
    DropCollection { name: String },

    // Documents
    InsertDocumentWithEmbedding {
        collection: Option<String>,
        document: NewDocument,
    },
    BatchInsertDocuments {
        collection: Option<String>,
        documents: Vec<NewDocument>,
    },
    GetDocument { collection: Option<String>, id: String },
    UpdateDocument {
        collection: Option<String>,
        document: NewDocument,
    },
    DeleteDocument { collection: Option<String>, id: String },

    // Search
    Search { request: SearchRequest },
    SearchText {
        collection: Option<String>,
        text: String,
        limit: Option<usize>,
    },
    SearchSemantic {
        collection: Option<String>,
        text: String,
        limit: Option<usize>,
    },
    SearchAdvanced { request: SearchRequest },
    SearchGlobal {
        request: SearchRequest,
        #[serde(default)]
        group_by_collection: bool,
    },

    // Embedding queue
    EnqueueEmbedding {
        collection: Option<String>,
        document_id: String,
        text: String,
        priority: Option<QueuePriority>,
    },
    ProcessEmbeddingQueue {
        collection: Option<String>,
        batch_size: Option<usize>,
        max_retries: Option<u32>,
    },
    GetQueueStatus { collection: Option<String> },
    ClearEmbeddingQueue { #[serde(default)] filter: QueuePurgeFilter },

    // Embedding pipeline
    GenerateQueryEmbedding { collection: Option<String>, text: String },
    BatchGenerateQueryEmbeddings {
        collection: Option<String>,
        texts: Vec<String>,
    },
    WarmEmbeddingCache {
        collection: Option<String>,
        texts: Vec<String>,
    },
    ClearEmbeddingCache { collection: Option<String> },
    GetPipelineStats,
    GetModelStatus,
    PreloadModels { collections: Vec<String> },
    OptimizeModelMemory,

    // LLM bridge
    EnhanceQuery { query: String, options: LlmCallOptions },
    SummarizeResults {
        query: String,
        results: Vec<localretrieve_core::models::SearchHit>,
        options: LlmCallOptions,
    },
    #[serde(rename = "searchWithLLM")]
    SearchWithLlm { request: SearchWithLlmRequest },
    #[serde(rename = "callLLM")]
    CallLlm { prompt: String, options: LlmCallOptions },

    // Durability
    Export,
    Import { image: Vec<u8> },
    Clear,
    ForceSync,
}

impl Request {
    /// Operation name used in logs and error envelopes.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::GetVersion => "getVersion",
            Self::GetStats => "getStats",
            Self::Exec { .. } => "exec",
            Self::Select { .. } => "select",
            Self::BulkInsert { .. } => "bulkInsert",
            Self::InitVecExtension => "initVecExtension",
            Self::InitializeSchema => "initializeSchema",
            Self::CreateCollection { .. } => "createCollection",
            Self::ListCollections => "listCollections",
            Self::GetCollectionInfo { .. } => "getCollectionInfo",
            Self::DropCollection { .. } => "dropCollection",
            Self::InsertDocumentWithEmbedding { .. } => "insertDocumentWithEmbedding",
            Self::BatchInsertDocuments { .. } => "batchInsertDocuments",
            Self::GetDocument { .. } => "getDocument",
            Self::UpdateDocument { .. } => "updateDocument",
            Self::DeleteDocument { .. } => "deleteDocument",
            Self::Search { .. } => "search",
            Self::SearchText { .. } => "searchText",
            Self::SearchSemantic { .. } => "searchSemantic",
            Self::SearchAdvanced { .. } => "searchAdvanced",
            Self::SearchGlobal { .. } => "searchGlobal",
            Self::EnqueueEmbedding { .. } => "enqueueEmbedding",
            Self::ProcessEmbeddingQueue { .. } => "processEmbeddingQueue",
            Self::GetQueueStatus { .. } => "getQueueStatus",
            Self::ClearEmbeddingQueue { .. } => "clearEmbeddingQueue",
            Self::GenerateQueryEmbedding { .. } => "generateQueryEmbedding",
            Self::BatchGenerateQueryEmbeddings { .. } => "batchGenerateQueryEmbeddings",
            Self::WarmEmbeddingCache { .. } => "warmEmbeddingCache",
            Self::ClearEmbeddingCache { .. } => "clearEmbeddingCache",
            Self::GetPipelineStats => "getPipelineStats",
            Self::GetModelStatus => "getModelStatus",
            Self::PreloadModels { .. } => "preloadModels",
            Self::OptimizeModelMemory => "optimizeModelMemory",
            Self::EnhanceQuery { .. } => "enhanceQuery",
            Self::SummarizeResults { .. } => "summarizeResults",
            Self::SearchWithLlm { .. } => "searchWithLLM",
            Self::CallLlm { .. } => "callLLM",
            Self::Export => "export",
            Self::Import { .. } => "import",
            Self::Clear => "clear",
            Self::ForceSync => "forceSync",
        }
    }

    /// Whether this operation can run before `open` succeeds.
    pub fn allowed_before_open(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Ping | Self::GetVersion)
    }
}

/// The wire error shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: String,
    pub message: String,
    pub user_message: String,
    pub severity: String,
    pub recoverable: bool,
    pub suggested_action: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// `{ success: true, result }` or `{ success: false, error }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<ErrorEnvelope>,
    pub request_id: String,
}

impl ResponseEnvelope {
    pub fn ok(request_id: String, result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            request_id,
        }
    }

    pub fn err(request_id: String, error: &RetrieveError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorEnvelope {
                kind: error.kind().as_str().to_string(),
                message: error.to_string(),
                user_message: error.user_message(),
                severity: error.severity().as_str().to_string(),
                recoverable: error.recoverable(),
                suggested_action: error.suggested_action().to_string(),
                request_id: request_id.clone(),
                timestamp: Utc::now(),
            }),
            request_id,
        }
    }
}

/// Parse a JSON request, mapping unknown `op` tags onto `MethodNotFound`.
pub fn parse_request(payload: &str) -> Result<Request, RetrieveError> {
    serde_json::from_str::<Request>(payload).map_err(|e| {
        let method = serde_json::from_str::<serde_json::Value>(payload)
            .ok()
            .and_then(|v| v.get("op").and_then(|op| op.as_str()).map(str::to_string));
        match method {
            Some(op) if is_unknown_op(&e) => {
                localretrieve_core::errors::ValidationError::MethodNotFound { method: op }.into()
            }
            _ => localretrieve_core::errors::ValidationError::InvalidArgument {
                reason: e.to_string(),
            }
            .into(),
        }
    })
}

fn is_unknown_op(e: &serde_json::Error) -> bool {
    e.to_string().contains("unknown variant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_roundtrip_as_tagged_json() {
        let request = Request::SearchText {
            collection: Some("default".to_string()),
            text: "Пушкин".to_string(),
            limit: Some(5),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"op\":\"searchText\""));
        let parsed = parse_request(&json).unwrap();
        assert_eq!(parsed.op_name(), "searchText");
    }

    #[test]
    fn unknown_op_maps_to_method_not_found() {
        let err = parse_request(r#"{"op": "teleport", "to": "mars"}"#).unwrap_err();
        assert!(matches!(
            err,
            RetrieveError::Validation(
                localretrieve_core::errors::ValidationError::MethodNotFound { .. }
            )
        ));
    }

    #[test]
    fn param_values_accept_json_scalars() {
        let params: Vec<ParamValue> =
            serde_json::from_str(r#"[null, 7, 1.5, "text", [1, 2, 255]]"#).unwrap();
        assert!(matches!(params[0], ParamValue::Null));
        assert!(matches!(params[1], ParamValue::Integer(7)));
        assert!(matches!(params[2], ParamValue::Real(_)));
        assert!(matches!(params[3], ParamValue::Text(_)));
        assert!(matches!(params[4], ParamValue::Blob(_)));
    }

    #[test]
    fn error_envelope_carries_the_taxonomy() {
        let err = RetrieveError::from(
            localretrieve_core::errors::ValidationError::EmptyQuery,
        );
        let envelope = ResponseEnvelope::err("req-1".to_string(), &err);
        assert!(!envelope.success);
        let error = envelope.error.unwrap();
        assert_eq!(error.kind, "validation");
        assert_eq!(error.severity, "low");
        assert!(!error.recoverable);
        assert_eq!(error.request_id, "req-1");
    }
}
