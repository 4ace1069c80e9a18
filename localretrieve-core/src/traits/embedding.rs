use crate::errors::RetrieveResult;

/// Embedding generation provider.
///
/// Implementations are a closed set (local ONNX inference, remote API);
/// the registry holds them behind `Box<dyn EmbeddingProvider>`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text, returning a vector of floats.
    fn generate(&self, text: &str) -> RetrieveResult<Vec<f32>>;

    /// Embed a batch of texts. Default: one call per text.
    fn generate_batch(&self, texts: &[String]) -> RetrieveResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.generate(t)).collect()
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Cheap liveness probe. Default: available.
    fn health_check(&self) -> RetrieveResult<()> {
        Ok(())
    }

    /// Release held resources. Called when a cached handle expires.
    fn dispose(&self) {}
}
