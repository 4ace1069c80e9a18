use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue priority: lower value processes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    High = 1,
    Normal = 2,
    Low = 3,
}

impl QueuePriority {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => Self::High,
            3 => Self::Low,
            _ => Self::Normal,
        }
    }
}

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A row of the `embedding_queue` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub collection: String,
    pub document_id: String,
    pub text_content: String,
    pub priority: QueuePriority,
    pub status: QueueItemStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Per-status counts for `getQueueStatus`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStatus {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Outcome of one `process()` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessResult {
    pub processed: usize,
    pub failed: usize,
    pub remaining_in_queue: usize,
    pub errors: Vec<String>,
}

/// Filter for `clearEmbeddingQueue`. Empty filter purges everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueuePurgeFilter {
    pub collection: Option<String>,
    pub status: Option<QueueItemStatus>,
    /// Purge completed items older than this timestamp.
    pub completed_before: Option<DateTime<Utc>>,
}
