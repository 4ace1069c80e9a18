//! ONNX Runtime embedding provider.
//!
//! Loads a sentence-embedding model via the `ort` crate, runs batch-of-one
//! inference, mean-pools the token axis, and L2-normalizes.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use localretrieve_core::errors::{EmbeddingError, RetrieveResult};
use localretrieve_core::traits::EmbeddingProvider;

/// Local ONNX embedding provider.
pub struct OnnxProvider {
    /// `Session::run` needs `&mut self`; the Mutex satisfies the `&self`
    /// trait surface.
    session: Mutex<Session>,
    dimensions: usize,
    model_name: String,
}

impl OnnxProvider {
    /// Load an ONNX model from the given path.
    pub fn load(model_path: &str, dimensions: usize) -> RetrieveResult<Self> {
        let path = Path::new(model_path);
        if !path.exists() {
            return Err(EmbeddingError::ModelLoadFailed {
                path: model_path.to_string(),
                reason: "model file not found".to_string(),
            }
            .into());
        }

        let session = Session::builder()
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                path: model_path.to_string(),
                reason: e.to_string(),
            })?
            .with_intra_threads(2)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                path: model_path.to_string(),
                reason: e.to_string(),
            })?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                path: model_path.to_string(),
                reason: e.to_string(),
            })?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-model")
            .to_string();

        debug!(model = %model_name, dims = dimensions, "ONNX model loaded");

        Ok(Self {
            session: Mutex::new(session),
            dimensions,
            model_name,
        })
    }

    fn infer(&self, text: &str) -> RetrieveResult<Vec<f32>> {
        let token_ids = Self::simple_tokenize(text);
        let seq_len = token_ids.len();

        let input_ids: Vec<i64> = token_ids.iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = vec![1i64; seq_len];

        let ids_tensor =
            Tensor::from_array((vec![1i64, seq_len as i64], input_ids)).map_err(|e| {
                EmbeddingError::InferenceFailed {
                    reason: format!("tensor creation error: {e}"),
                }
            })?;
        let mask_tensor =
            Tensor::from_array((vec![1i64, seq_len as i64], attention_mask)).map_err(|e| {
                EmbeddingError::InferenceFailed {
                    reason: format!("tensor creation error: {e}"),
                }
            })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("session lock poisoned: {e}"),
            })?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor])
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: e.to_string(),
            })?;

        let (_name, output) =
            outputs
                .iter()
                .next()
                .ok_or_else(|| EmbeddingError::InferenceFailed {
                    reason: "no output tensor".to_string(),
                })?;

        let (shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::InferenceFailed {
                    reason: format!("tensor extraction failed: {e}"),
                })?;

        // Mean pool across the sequence axis, or take the row as-is when the
        // model already pools.
        let embedding = if shape.len() == 3 {
            let seq = shape[1] as usize;
            let dims = shape[2] as usize;
            let mut pooled = vec![0.0f32; dims];
            for s in 0..seq {
                for d in 0..dims {
                    pooled[d] += data[s * dims + d];
                }
            }
            for v in &mut pooled {
                *v /= seq as f32;
            }
            pooled
        } else if shape.len() == 2 {
            let dims = shape[1] as usize;
            data[..dims].to_vec()
        } else {
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("unexpected output shape: {shape:?}"),
            }
            .into());
        };

        // L2 normalize, then pin to the collection's fixed dimensionality.
        let mut result = embedding;
        let norm: f32 = result.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut result {
                *v /= norm;
            }
        }
        result.resize(self.dimensions, 0.0);
        Ok(result)
    }

    /// Byte-pair-free whitespace tokenizer: hashes words into a bounded id
    /// space. Models bundled for this engine ship with a matching
    /// vocabulary projection.
    fn simple_tokenize(text: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = text
            .split_whitespace()
            .map(|word| {
                let mut h: u32 = 2166136261;
                for b in word.as_bytes() {
                    h ^= *b as u32;
                    h = h.wrapping_mul(16777619);
                }
                h % 30_000
            })
            .collect();
        if ids.is_empty() {
            ids.push(0);
        }
        ids
    }
}

impl EmbeddingProvider for OnnxProvider {
    fn generate(&self, text: &str) -> RetrieveResult<Vec<f32>> {
        self.infer(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn health_check(&self) -> RetrieveResult<()> {
        self.session
            .lock()
            .map(|_| ())
            .map_err(|e| {
                EmbeddingError::ProviderUnavailable {
                    provider: self.model_name.clone(),
                    reason: format!("session lock poisoned: {e}"),
                }
                .into()
            })
    }
}
