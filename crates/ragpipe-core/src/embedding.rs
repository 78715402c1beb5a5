//! Embedding model interface and vector utilities.
//!
//! [`Embedder`] is the narrow interface the engine depends on: one batched
//! call, order-preserving. Concrete model-backed implementations (fastembed)
//! live in the `ragpipe` app crate; [`HashEmbedder`] lives here because it
//! is pure and useful for offline runs and tests.
//!
//! Calls are blocking. Async callers run them under `spawn_blocking`.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A sentence-embedding model.
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-small-en-v1.5"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts in one model call.
    ///
    /// Implementations must return exactly one vector per input, in input
    /// order. Empty strings are valid input.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        if vectors.len() != 1 {
            return Err(Error::Inference(format!(
                "expected 1 embedding, model returned {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Check a batch of model outputs against the contract: one vector per
/// input, every vector `dims` long, every value finite.
pub fn validate_embeddings(vectors: &[Vec<f32>], expected: usize, dims: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::Inference(format!(
            "embedding batch returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dims {
            return Err(Error::Inference(format!(
                "embedding {} has {} dimensions, expected {}",
                i,
                v.len(),
                dims
            )));
        }
        if let Some(bad) = v.iter().find(|x| !x.is_finite()) {
            return Err(Error::Inference(format!(
                "embedding {} contains non-finite value {}",
                i, bad
            )));
        }
    }
    Ok(())
}

/// Deterministic feature-hashing embedder.
///
/// Each whitespace token is hashed with SHA-256 into one of `dims` buckets
/// with a signed weight, and the result is L2-normalized. Texts sharing
/// tokens get similar vectors, which is enough for wiring tests and fully
/// offline runs. Selected only via `embedding.provider = "hash"`.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::Validation(
                "hash embedder needs dims > 0".to_string(),
            ));
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_deterministic() {
        let e = HashEmbedder::new(64).unwrap();
        let a = e.embed("the quick brown fox").unwrap();
        let b = e.embed("the quick brown fox").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_empty_input() {
        let e = HashEmbedder::new(16).unwrap();
        let v = e.embed("").unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let e = HashEmbedder::new(32).unwrap();
        let texts: Vec<String> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let batch = e.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 3);
        for (i, t) in texts.iter().enumerate() {
            assert_eq!(batch[i], e.embed(t).unwrap());
        }
    }

    #[test]
    fn test_shared_tokens_are_closer() {
        let e = HashEmbedder::new(256).unwrap();
        let q = e.embed("rust cargo crates").unwrap();
        let near = e.embed("cargo builds rust crates").unwrap();
        let far = e.embed("python notebooks pandas").unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }

    #[test]
    fn test_validate_embeddings() {
        assert!(validate_embeddings(&[vec![0.1, 0.2]], 1, 2).is_ok());
        assert!(validate_embeddings(&[vec![0.1, 0.2]], 2, 2).is_err());
        assert!(validate_embeddings(&[vec![0.1]], 1, 2).is_err());
        let err = validate_embeddings(&[vec![0.1, f32::NAN]], 1, 2).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert!(validate_embeddings(&[vec![f32::INFINITY, 0.0]], 1, 2).is_err());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
