use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a collection generates embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Enabled,
    Disabled,
    Pending,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Background-processing state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "processing" => Some(Self::Processing),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A row of the `collections` registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u32,
    /// Opaque per-collection key-value bag.
    pub config: serde_json::Value,
    pub embedding_provider: Option<String>,
    /// Fixed at creation; immutable afterwards.
    pub embedding_dimensions: usize,
    pub embedding_status: EmbeddingStatus,
    pub processing_status: ProcessingStatus,
}
