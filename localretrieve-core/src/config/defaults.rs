//! Default values for every configuration section.

/// Auto-snapshot period for the durability store.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 5_000;

/// Base directory for `opfs:` logical paths.
pub const DEFAULT_BASE_DIR: &str = ".localretrieve";

/// Page cache budget in KiB (64 MiB).
pub const DEFAULT_CACHE_SIZE_KIB: u64 = 64 * 1024;

/// Journal mode for the live (in-memory image) database.
pub const DEFAULT_JOURNAL_MODE: &str = "memory";

/// Unicode-aware FTS tokenizer with diacritic folding.
pub const DEFAULT_FTS_TOKENIZER: &str = "unicode61 remove_diacritics 2";

/// Embedding provider used when a collection does not choose one.
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "local";

/// L1 (memory) cache TTL: 5 minutes.
pub const DEFAULT_MEMORY_TTL_MS: u64 = 300_000;

/// L1 (memory) cache entry cap.
pub const DEFAULT_MEMORY_MAX_ENTRIES: u64 = 1_000;

/// L2 (persistent sidecar) cache TTL: 24 hours.
pub const DEFAULT_PERSISTENT_TTL_MS: u64 = 86_400_000;

/// L3 (SQL table) cache TTL: 7 days.
pub const DEFAULT_SQL_TTL_MS: u64 = 604_800_000;

/// Provider handles idle-expire after 30 minutes.
pub const DEFAULT_PROVIDER_IDLE_EXPIRY_MS: u64 = 30 * 60 * 1000;

/// Registry cleanup timer period: 5 minutes.
pub const DEFAULT_PROVIDER_CLEANUP_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Queue processing batch size.
pub const DEFAULT_QUEUE_BATCH_SIZE: usize = 10;

/// Queue retry cap before an item is marked failed.
pub const DEFAULT_QUEUE_MAX_RETRIES: u32 = 3;

/// LLM request timeout.
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 10_000;

/// LLM retry count (exponential backoff, 2^n seconds).
pub const DEFAULT_LLM_MAX_RETRIES: u32 = 2;

/// RPC operation deadline.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// RRF smoothing constant.
pub const DEFAULT_FUSION_K: u32 = 60;

/// Result limit when the request does not set one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Default weighted-fusion weights (fts, vec).
pub const DEFAULT_FUSION_WEIGHT_FTS: f64 = 0.6;
pub const DEFAULT_FUSION_WEIGHT_VEC: f64 = 0.4;
