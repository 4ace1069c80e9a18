//! Capability traits implemented across the workspace.

mod embedding;

pub use embedding::EmbeddingProvider;
