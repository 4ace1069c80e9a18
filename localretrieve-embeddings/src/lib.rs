//! # localretrieve-embeddings
//!
//! Embedding pipeline: provider registry with lazy initialization and idle
//! expiry, three-tier embedding cache, background queue processing, and
//! adaptive batch insert for documents with embeddings.

pub mod batch;
pub mod cache;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod registry;

pub use pipeline::EmbeddingPipeline;
pub use registry::ProviderRegistry;
