//! Candidate ranking: turn store hits plus cross-encoder scores into the
//! final ordered result list.
//!
//! The store and the reranker run in the app crate; this module only does
//! the pure part, so it can be tested without either.
//!
//! # Ordering
//!
//! 1. Pair each candidate with its score (same position in both slices).
//! 2. Put the pairs in store order (`rank` ascending).
//! 3. Stable sort by relevance score, descending, so equal scores keep the
//!    store's order.
//! 4. Truncate to `k`.

use crate::error::{Error, Result};
use crate::models::{Candidate, RankedChunk};

/// Combine candidates with their reranker scores and keep the best `k`.
///
/// `scores[i]` must belong to `candidates[i]`; the candidates may come in
/// any order. Scores are assumed finite; see
/// [`validate_scores`](crate::rerank::validate_scores).
pub fn rank_candidates(
    candidates: Vec<Candidate>,
    scores: &[f32],
    k: usize,
) -> Result<Vec<RankedChunk>> {
    if candidates.len() != scores.len() {
        return Err(Error::Inference(format!(
            "{} scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    let mut ranked: Vec<RankedChunk> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .map(|(c, score)| RankedChunk {
            chunk: c.chunk,
            relevance_score: score,
            similarity_score: c.similarity,
            retrieval_rank: c.rank,
        })
        .collect();

    ranked.sort_by_key(|r| r.retrieval_rank);
    ranked.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);
    Ok(ranked)
}
