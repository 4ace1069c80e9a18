//! Embedding providers: local ONNX inference, a remote key-authenticated
//! API, and a deterministic hashing fallback for degraded or offline
//! operation.

pub mod hash_provider;
pub mod onnx_provider;
pub mod remote_provider;

use localretrieve_core::config::EmbeddingConfig;
use localretrieve_core::errors::{EmbeddingError, RetrieveResult};
use localretrieve_core::traits::EmbeddingProvider;

pub use hash_provider::HashProvider;
pub use onnx_provider::OnnxProvider;
pub use remote_provider::RemoteProvider;

/// Resolved provider parameters for one collection.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// `local`, `openai`, `custom`, or `hash`.
    pub kind: String,
    pub dimensions: usize,
    pub model_path: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl ProviderSpec {
    /// Build a spec from a collection's provider choice and the engine
    /// configuration.
    pub fn resolve(
        collection_provider: Option<&str>,
        config: &EmbeddingConfig,
        dimensions: usize,
    ) -> Self {
        let kind = collection_provider
            .unwrap_or(&config.default_provider)
            .to_string();
        Self {
            kind,
            dimensions,
            model_path: config.model_path.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Instantiate a provider from a spec. The variants are a closed set.
pub fn create_provider(spec: &ProviderSpec) -> RetrieveResult<Box<dyn EmbeddingProvider>> {
    match spec.kind.as_str() {
        "local" => {
            let path = spec.model_path.as_deref().ok_or_else(|| {
                EmbeddingError::ModelLoadFailed {
                    path: "<unset>".to_string(),
                    reason: "embedding.model_path is required for the local provider"
                        .to_string(),
                }
            })?;
            Ok(Box::new(OnnxProvider::load(path, spec.dimensions)?))
        }
        "openai" | "custom" => Ok(Box::new(RemoteProvider::new(spec)?)),
        "hash" => Ok(Box::new(HashProvider::new(spec.dimensions))),
        other => Err(EmbeddingError::ProviderUnavailable {
            provider: other.to_string(),
            reason: "unknown provider kind".to_string(),
        }
        .into()),
    }
}
