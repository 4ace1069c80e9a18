use super::Severity;

/// Durability-store errors (the origin-scoped file store).
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to load database image from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("failed to save database image to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("failed to clear '{path}': {reason}")]
    ClearFailed { path: String, reason: String },

    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    #[error("durability store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("database image at '{path}' is corrupt: {reason}")]
    CorruptImage { path: String, reason: String },
}

impl PersistenceError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::CorruptImage { .. } => Severity::High,
            _ => Severity::Medium,
        }
    }

    pub fn recoverable(&self) -> bool {
        !matches!(self, Self::CorruptImage { .. })
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => {
                "clear browser storage or export data to free space"
            }
            Self::LoadFailed { .. } | Self::CorruptImage { .. } => {
                "clear storage and restore from an export"
            }
            Self::SaveFailed { .. } => "retry, export data, or clear storage",
            Self::ClearFailed { .. } => "retry clearing the store",
            Self::StoreUnavailable { .. } => {
                "continue in memory, or restart with a writable store"
            }
        }
    }
}
