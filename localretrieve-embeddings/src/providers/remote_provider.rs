//! Remote embedding provider: a key-authenticated embeddings endpoint
//! speaking the OpenAI embeddings request shape.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use localretrieve_core::errors::{EmbeddingError, RetrieveResult};
use localretrieve_core::traits::EmbeddingProvider;

use super::ProviderSpec;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote API embedding provider.
pub struct RemoteProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl RemoteProvider {
    pub fn new(spec: &ProviderSpec) -> RetrieveResult<Self> {
        let api_key = spec.api_key.clone().ok_or_else(|| {
            EmbeddingError::ProviderUnavailable {
                provider: spec.kind.clone(),
                reason: "embedding.api_key is required for remote providers".to_string(),
            }
        })?;
        let endpoint = match spec.kind.as_str() {
            "custom" => spec.endpoint.clone().ok_or_else(|| {
                EmbeddingError::ProviderUnavailable {
                    provider: "custom".to_string(),
                    reason: "embedding.endpoint is required for the custom provider"
                        .to_string(),
                }
            })?,
            _ => spec
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_EMBEDDINGS_URL.to_string()),
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::ProviderUnavailable {
                provider: spec.kind.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            model: spec
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            dimensions: spec.dimensions,
        })
    }

    fn request(&self, inputs: &[&str]) -> RetrieveResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
            "dimensions": self.dimensions,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| EmbeddingError::ProviderUnavailable {
                provider: self.model.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("HTTP {status}: {text}"),
            }
            .into());
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .map_err(|e| EmbeddingError::InferenceFailed {
                    reason: format!("bad embeddings response: {e}"),
                })?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            if v.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    provider: self.model.clone(),
                    expected: self.dimensions,
                    actual: v.len(),
                }
                .into());
            }
        }
        debug!(model = %self.model, count = vectors.len(), "remote embeddings generated");
        Ok(vectors)
    }
}

impl EmbeddingProvider for RemoteProvider {
    fn generate(&self, text: &str) -> RetrieveResult<Vec<f32>> {
        let mut vectors = self.request(&[text])?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::InferenceFailed {
                reason: "empty embeddings response".to_string(),
            }
            .into()
        })
    }

    fn generate_batch(&self, texts: &[String]) -> RetrieveResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&refs)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// Keep the key out of Debug output.
impl std::fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
