use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::QueueStatus;

/// Hit/miss counters for one cache tier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub persistent_hits: u64,
    pub sql_hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from any tier.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.persistent_hits + self.sql_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// `getPipelineStats` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub cache: CacheStats,
    pub embeddings_generated: u64,
    pub queue: QueueStatus,
    pub active_providers: usize,
}

/// `getModelStatus` payload, one entry per cached provider handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub collection: String,
    pub provider: String,
    pub dimensions: usize,
    pub last_used: DateTime<Utc>,
}

/// Durability-layer state, part of `getStats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DurabilityState {
    pub persistent: bool,
    pub logical_path: Option<String>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub image_bytes: Option<u64>,
}

/// `getStats` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub collections: usize,
    pub documents: u64,
    pub queue: QueueStatus,
    pub cache: CacheStats,
    pub durability: DurabilityState,
}
