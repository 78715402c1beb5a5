//! Cross-encoder reranking interface.
//!
//! A [`Reranker`] scores `(query, candidate)` pairs directly. Scores carry
//! no fixed range; only their order within one batch matters. Calls are
//! blocking, like [`Embedder`](crate::embedding::Embedder).

use crate::error::{Error, Result};

pub trait Reranker: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-reranker-base"`).
    fn model_name(&self) -> &str;

    /// Score every candidate against `query` in one model call.
    ///
    /// Implementations must return exactly one score per candidate, in
    /// candidate order. Higher is more relevant.
    fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;

    /// Score a single candidate.
    fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[candidate.to_string()])?;
        match scores.as_slice() {
            [s] => Ok(*s),
            other => Err(Error::Inference(format!(
                "expected 1 score, model returned {}",
                other.len()
            ))),
        }
    }
}

/// Check reranker output: one finite score per candidate.
pub fn validate_scores(scores: &[f32], expected: usize) -> Result<()> {
    if scores.len() != expected {
        return Err(Error::Inference(format!(
            "reranker returned {} scores for {} candidates",
            scores.len(),
            expected
        )));
    }
    if let Some((i, bad)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(Error::Inference(format!(
            "reranker score {} is non-finite ({})",
            i, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthReranker;

    impl Reranker for LengthReranker {
        fn model_name(&self) -> &str {
            "length"
        }
        fn score_batch(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>> {
            Ok(candidates.iter().map(|c| c.len() as f32).collect())
        }
    }

    #[test]
    fn test_score_delegates_to_batch() {
        let r = LengthReranker;
        assert_eq!(r.score("q", "abcd").unwrap(), 4.0);
    }

    #[test]
    fn test_validate_scores() {
        assert!(validate_scores(&[0.1, -3.0], 2).is_ok());
        assert!(validate_scores(&[0.1], 2).is_err());
        assert!(validate_scores(&[0.1, f32::NAN], 2).is_err());
        assert!(validate_scores(&[], 0).is_ok());
    }
}
