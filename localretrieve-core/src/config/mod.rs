//! Engine configuration, one section per subsystem.
//!
//! Every section carries `#[serde(default)]` so a partial TOML file only
//! overrides what it names.

pub mod defaults;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::errors::{RetrieveResult, ValidationError};

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveConfig {
    pub durability: DurabilityConfig,
    pub sql: SqlConfig,
    pub fts: FtsConfig,
    pub embedding: EmbeddingConfig,
    pub queue: QueueConfig,
    pub llm: LlmConfig,
    pub rpc: RpcConfig,
    pub search: SearchConfig,
}

impl RetrieveConfig {
    /// Parse a TOML configuration string.
    pub fn from_toml(toml_str: &str) -> RetrieveResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            ValidationError::InvalidConfiguration {
                field: "toml".to_string(),
                reason: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field validation. The FTS tokenizer must be Unicode-aware:
    /// non-ASCII queries silently return nothing under an ASCII tokenizer.
    pub fn validate(&self) -> RetrieveResult<()> {
        if !self.fts.tokenizer.contains("unicode61") {
            return Err(ValidationError::InvalidConfiguration {
                field: "fts.tokenizer".to_string(),
                reason: format!(
                    "'{}' is not Unicode-aware; use a unicode61-based tokenizer",
                    self.fts.tokenizer
                ),
            }
            .into());
        }
        if self.embedding.dimensions == 0 {
            return Err(ValidationError::InvalidConfiguration {
                field: "embedding.dimensions".to_string(),
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Durability-store section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DurabilityConfig {
    /// Directory backing `opfs:/…` logical paths.
    pub base_dir: String,
    /// Auto-snapshot period in milliseconds.
    pub sync_interval_ms: u64,
    /// Optional storage cap. When set, a snapshot requires
    /// `cap - used >= 2 * image_size`. When unset, quota is unknown.
    pub quota_bytes: Option<u64>,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            base_dir: defaults::DEFAULT_BASE_DIR.to_string(),
            sync_interval_ms: defaults::DEFAULT_SYNC_INTERVAL_MS,
            quota_bytes: None,
        }
    }
}

/// SQL engine section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Page cache budget in KiB.
    pub cache_size_kib: u64,
    /// `memory` (default) or `wal` where the engine supports it.
    pub journal_mode: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            cache_size_kib: defaults::DEFAULT_CACHE_SIZE_KIB,
            journal_mode: defaults::DEFAULT_JOURNAL_MODE.to_string(),
        }
    }
}

/// Full-text index section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtsConfig {
    /// FTS5 tokenizer spec. Must be Unicode-aware.
    pub tokenizer: String,
}

impl Default for FtsConfig {
    fn default() -> Self {
        Self {
            tokenizer: defaults::DEFAULT_FTS_TOKENIZER.to_string(),
        }
    }
}

/// Embedding pipeline section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local`, `openai`, or `custom`.
    pub default_provider: String,
    /// Fixed per-collection dimensionality for new collections.
    pub dimensions: usize,
    /// Path to the ONNX model for the local provider.
    pub model_path: Option<String>,
    /// Endpoint for the remote provider.
    pub endpoint: Option<String>,
    /// Model identifier sent to the remote provider.
    pub model: Option<String>,
    /// API key for the remote provider. Lives only in runtime config and
    /// is never written into the database image.
    pub api_key: Option<String>,
    pub cache: EmbeddingCacheConfig,
    /// Idle expiry for cached provider handles.
    pub provider_idle_expiry_ms: u64,
    /// Registry cleanup timer period.
    pub provider_cleanup_interval_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            default_provider: defaults::DEFAULT_EMBEDDING_PROVIDER.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            model_path: None,
            endpoint: None,
            model: None,
            api_key: None,
            cache: EmbeddingCacheConfig::default(),
            provider_idle_expiry_ms: defaults::DEFAULT_PROVIDER_IDLE_EXPIRY_MS,
            provider_cleanup_interval_ms: defaults::DEFAULT_PROVIDER_CLEANUP_INTERVAL_MS,
        }
    }
}

/// Three-tier cache TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingCacheConfig {
    pub memory_ttl_ms: u64,
    pub memory_max_entries: u64,
    pub persistent_ttl_ms: u64,
    pub sql_ttl_ms: u64,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl_ms: defaults::DEFAULT_MEMORY_TTL_MS,
            memory_max_entries: defaults::DEFAULT_MEMORY_MAX_ENTRIES,
            persistent_ttl_ms: defaults::DEFAULT_PERSISTENT_TTL_MS,
            sql_ttl_ms: defaults::DEFAULT_SQL_TTL_MS,
        }
    }
}

/// Background queue section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::DEFAULT_QUEUE_BATCH_SIZE,
            max_retries: defaults::DEFAULT_QUEUE_MAX_RETRIES,
        }
    }
}

/// LLM bridge section. Credentials are supplied per call, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::DEFAULT_LLM_TIMEOUT_MS,
            max_retries: defaults::DEFAULT_LLM_MAX_RETRIES,
        }
    }
}

/// RPC boundary section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub operation_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: defaults::DEFAULT_OPERATION_TIMEOUT_MS,
        }
    }
}

/// Search engine section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// RRF smoothing constant.
    pub fusion_k: u32,
    pub default_limit: usize,
    pub weight_fts: f64,
    pub weight_vec: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fusion_k: defaults::DEFAULT_FUSION_K,
            default_limit: defaults::DEFAULT_SEARCH_LIMIT,
            weight_fts: defaults::DEFAULT_FUSION_WEIGHT_FTS,
            weight_vec: defaults::DEFAULT_FUSION_WEIGHT_VEC,
        }
    }
}
