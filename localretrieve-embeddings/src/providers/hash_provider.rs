//! Deterministic term-hashing provider.
//!
//! Produces fixed-dimension vectors by hashing terms into buckets and
//! weighting by term frequency. No model files, no network — the last
//! resort when neither the local model nor a remote key is configured,
//! and the provider tests run against.

use std::collections::HashMap;

use localretrieve_core::errors::RetrieveResult;
use localretrieve_core::traits::EmbeddingProvider;

/// Hashing fallback embedding provider.
pub struct HashProvider {
    dimensions: usize,
}

impl HashProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Hash a term into a bucket index using FNV-1a.
    fn hash_term(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % dims
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for tok in &tokens {
            *tf.entry(tok.clone()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &tf {
            let freq = count / total;
            // Longer terms carry more signal than near-stopwords.
            let weight = 1.0 + (term.len() as f32).ln();
            let bucket = Self::hash_term(term, self.dimensions);
            vec[bucket] += freq * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl EmbeddingProvider for HashProvider {
    fn generate(&self, text: &str) -> RetrieveResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn generate_batch(&self, texts: &[String]) -> RetrieveResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_returns_zero_vector() {
        let p = HashProvider::new(64);
        let v = p.generate("").unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn same_text_same_vector() {
        let p = HashProvider::new(64);
        let a = p.generate("deterministic embedding output").unwrap();
        let b = p.generate("deterministic embedding output").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nonempty_text_is_unit_norm() {
        let p = HashProvider::new(64);
        let v = p.generate("some meaningful words here").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn different_texts_differ() {
        let p = HashProvider::new(64);
        let a = p.generate("machine learning models").unwrap();
        let b = p.generate("cooking pasta recipes").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn batch_matches_single() {
        let p = HashProvider::new(32);
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let batch = p.generate_batch(&texts).unwrap();
        assert_eq!(batch[0], p.generate("alpha beta").unwrap());
        assert_eq!(batch[1], p.generate("gamma delta").unwrap());
    }
}
