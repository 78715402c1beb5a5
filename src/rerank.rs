//! Cross-encoder reranking provider.
//!
//! [`FastEmbedReranker`] runs a cross-encoder locally via fastembed's
//! `TextRerank`. fastembed returns results sorted by score; the adapter
//! puts them back into candidate order using each result's `index`, which
//! is what [`Reranker::score_batch`] promises.

use std::sync::Arc;

use ragpipe_core::error::{Error, ModelKind, Result};
use ragpipe_core::rerank::{validate_scores, Reranker};

use crate::config::RerankerConfig;
use crate::slot::run_blocking;

/// Score every candidate against `query` in one model call on the blocking
/// pool. Scores come back in candidate order and are checked to be finite.
pub async fn score_candidates(
    reranker: Arc<dyn Reranker>,
    query: String,
    candidates: Vec<String>,
) -> Result<Vec<f32>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    run_blocking(move || {
        let scores = reranker.score_batch(&query, &candidates)?;
        validate_scores(&scores, candidates.len())?;
        Ok(scores)
    })
    .await
}

#[cfg(feature = "local-models")]
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "local-models")]
pub struct FastEmbedReranker {
    model: Mutex<fastembed::TextRerank>,
    model_name: String,
    batch_size: usize,
}

#[cfg(feature = "local-models")]
impl FastEmbedReranker {
    pub fn new(config: &RerankerConfig, cache_dir: &std::path::Path) -> Result<Self> {
        let load_err = |reason: String| Error::ModelLoad {
            kind: ModelKind::Reranking,
            model: config.model.clone(),
            reason,
        };

        let reranker_model = config_to_reranker_model(&config.model).map_err(load_err)?;
        let model = fastembed::TextRerank::try_new(
            fastembed::RerankInitOptions::new(reranker_model)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| load_err(e.to_string()))?;

        tracing::info!(model = %config.model, "reranker model loaded");

        Ok(Self {
            model: Mutex::new(model),
            model_name: config.model.clone(),
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-models")]
impl Reranker for FastEmbedReranker {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let results = {
            let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            model
                .rerank(query, documents, false, Some(self.batch_size))
                .map_err(|e| Error::Inference(format!("local reranking failed: {}", e)))?
        };
        restore_input_order(
            results.into_iter().map(|r| (r.index, r.score)),
            candidates.len(),
        )
    }
}

#[cfg(feature = "local-models")]
fn config_to_reranker_model(name: &str) -> std::result::Result<fastembed::RerankerModel, String> {
    match name {
        "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
        "jina-reranker-v2-base-multilingual" => {
            Ok(fastembed::RerankerModel::JINARerankerV2BaseMultiligual)
        }
        other => Err(format!(
            "unknown local reranker model '{}'. Supported models: \
             bge-reranker-base, bge-reranker-v2-m3, \
             jina-reranker-v1-turbo-en, jina-reranker-v2-base-multilingual",
            other
        )),
    }
}

/// Place `(index, score)` pairs at their index. Every slot must be filled
/// exactly once.
#[cfg_attr(not(feature = "local-models"), allow(dead_code))]
pub(crate) fn restore_input_order(
    results: impl IntoIterator<Item = (usize, f32)>,
    expected: usize,
) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for (index, score) in results {
        let slot = scores.get_mut(index).ok_or_else(|| {
            Error::Inference(format!(
                "reranker returned index {} for {} candidates",
                index, expected
            ))
        })?;
        if slot.is_some() {
            return Err(Error::Inference(format!(
                "reranker returned index {} twice",
                index
            )));
        }
        *slot = Some(score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| Error::Inference(format!("reranker returned no score for candidate {}", i)))
        })
        .collect()
}

/// Create the configured [`Reranker`]. Blocking; see
/// [`create_embedder`](crate::embedding::create_embedder).
///
/// Model weights share the embedding cache directory.
pub fn create_reranker(
    config: &RerankerConfig,
    cache_dir: &std::path::Path,
) -> Result<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        #[cfg(feature = "local-models")]
        "local" => Ok(Arc::new(FastEmbedReranker::new(config, cache_dir)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => {
            let _ = cache_dir;
            Err(Error::ModelLoad {
                kind: ModelKind::Reranking,
                model: config.model.clone(),
                reason: "local reranker requires --features local-models".to_string(),
            })
        }
        other => Err(Error::ModelLoad {
            kind: ModelKind::Reranking,
            model: config.model.clone(),
            reason: format!("unknown reranker provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_input_order() {
        let scores = restore_input_order(vec![(2, 9.0), (0, 3.0), (1, -1.0)], 3).unwrap();
        assert_eq!(scores, vec![3.0, -1.0, 9.0]);
    }

    #[test]
    fn test_restore_rejects_gaps_and_duplicates() {
        assert!(restore_input_order(vec![(0, 1.0)], 2).is_err());
        assert!(restore_input_order(vec![(0, 1.0), (0, 2.0)], 2).is_err());
        assert!(restore_input_order(vec![(5, 1.0)], 1).is_err());
    }

    #[test]
    fn test_unknown_provider_is_load_error() {
        let config = RerankerConfig {
            provider: "keyword".to_string(),
            ..RerankerConfig::default()
        };
        let err = create_reranker(&config, std::path::Path::new(".cache"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::ModelLoad {
                kind: ModelKind::Reranking,
                ..
            }
        ));
    }
}
