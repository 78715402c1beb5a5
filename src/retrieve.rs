//! Retrieval orchestrator.
//!
//! `query → embed → over-fetch k × multiplier candidates → rerank all of
//! them in one batch → top k by relevance`.
//!
//! Arguments are validated before any I/O. A collection that does not
//! exist yet yields an empty result, as does a search with no hits; the
//! reranker is not loaded in either case.

use ragpipe_core::error::{validate_collection_name, Error, Result};
use ragpipe_core::models::{RankedChunk, SearchMode};
use ragpipe_core::search::rank_candidates;

use crate::embedding::embed_query;
use crate::engine::Engine;
use crate::rerank::score_candidates;

/// Per-call overrides of the `[retrieval]` config section.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub collection: Option<String>,
    pub fetch_multiplier: Option<usize>,
    pub mode: Option<SearchMode>,
}

#[tracing::instrument(
    skip(engine, options),
    fields(collection = tracing::field::Empty, candidates = tracing::field::Empty)
)]
pub async fn retrieve(
    engine: &Engine,
    query: &str,
    k: usize,
    options: &RetrieveOptions,
) -> Result<Vec<RankedChunk>> {
    let defaults = &engine.config().retrieval;
    let collection = options
        .collection
        .as_deref()
        .unwrap_or(&defaults.collection);
    let multiplier = options.fetch_multiplier.unwrap_or(defaults.fetch_multiplier);
    let mode = options.mode.unwrap_or_else(|| defaults.search_mode());

    if k == 0 {
        return Err(Error::Validation("k must be >= 1".to_string()));
    }
    if multiplier == 0 {
        return Err(Error::Validation("fetch_multiplier must be >= 1".to_string()));
    }
    if query.trim().is_empty() {
        return Err(Error::Validation("query must not be blank".to_string()));
    }
    if let SearchMode::Hybrid { alpha } = mode {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Validation(format!(
                "hybrid alpha must be in [0.0, 1.0], got {}",
                alpha
            )));
        }
    }
    validate_collection_name(collection)?;
    let limit = k
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Validation("k × fetch_multiplier overflows".to_string()))?;

    let span = tracing::Span::current();
    span.record("collection", collection);

    let client = engine.get_client().await?;
    if !client.collection_exists(collection).await? {
        tracing::debug!("collection does not exist; returning no results");
        return Ok(Vec::new());
    }

    let embedder = engine.get_embedder().await?;
    let vector = embed_query(embedder, query).await?;

    let candidates = client.search(collection, query, &vector, limit, mode).await?;
    span.record("candidates", candidates.len());
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let reranker = engine.get_reranker().await?;
    let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
    let started = std::time::Instant::now();
    let scores = score_candidates(reranker, query.to_string(), texts).await?;
    tracing::debug!(
        scored = scores.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reranked candidates"
    );

    rank_candidates(candidates, &scores, k)
}
