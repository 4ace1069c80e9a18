use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document, as returned by reads and search.
///
/// `metadata` is preserved exactly as supplied at insert time: the engine
/// never injects or overwrites keys, and a user key named `collection`
/// inside metadata is untouched (the logical collection lives in its own
/// column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Internal monotonic key joining the document to its FTS and vector
    /// rows. Assigned by the engine; stable across updates.
    pub rowid: i64,
    pub title: Option<String>,
    pub content: String,
    pub collection: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input shape for inserts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    /// Caller-chosen id. Generated when absent.
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    /// Optional pre-computed embedding stored alongside the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}
