//! Embedding providers.
//!
//! Implements the core [`Embedder`] trait for:
//! - **[`FastEmbedEmbedder`]**: runs a sentence-embedding model locally via
//!   fastembed. The model is downloaded on first use and cached under
//!   `embedding.cache_dir`; after that no network calls are made.
//! - **`HashEmbedder`** (from `ragpipe_core`): deterministic feature hashing,
//!   selected only with `provider = "hash"`.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to build the configured provider:
//!
//! ```rust
//! # use ragpipe::config::EmbeddingConfig;
//! # use ragpipe::embedding::create_embedder;
//! let config = EmbeddingConfig {
//!     provider: "hash".to_string(),
//!     dims: Some(64),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.dims(), 64);
//! ```
//!
//! Construction of a local model takes seconds and blocks; callers on an
//! async runtime go through the engine, which runs it under
//! `spawn_blocking` and caches the result.

use std::sync::Arc;

use ragpipe_core::embedding::{validate_embeddings, Embedder, HashEmbedder};
use ragpipe_core::error::{Error, ModelKind, Result};

use crate::config::EmbeddingConfig;
use crate::slot::run_blocking;

/// Embed a batch of texts on the blocking pool.
///
/// The output is checked against the input: one vector per text, each
/// `embedder.dims()` long, all values finite. Violations are
/// [`Error::Inference`].
pub async fn embed_texts(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    run_blocking(move || {
        let vectors = embedder.embed_batch(&texts)?;
        validate_embeddings(&vectors, texts.len(), embedder.dims())?;
        Ok(vectors)
    })
    .await
}

/// Embed a single query text.
pub async fn embed_query(embedder: Arc<dyn Embedder>, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embed_texts(embedder, vec![text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::Inference("empty embedding response".to_string()))
}

#[cfg(feature = "local-models")]
use std::sync::{Mutex, PoisonError};

/// Local sentence-embedding model.
///
/// `TextEmbedding::embed` takes `&mut self`, so the model sits behind a
/// `Mutex` to satisfy the `Sync` bound on [`Embedder`].
#[cfg(feature = "local-models")]
pub struct FastEmbedEmbedder {
    model: Mutex<fastembed::TextEmbedding>,
    model_name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-models")]
impl FastEmbedEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let load_err = |reason: String| Error::ModelLoad {
            kind: ModelKind::Embedding,
            model: config.model.clone(),
            reason,
        };

        let fastembed_model = config_to_fastembed_model(&config.model).map_err(load_err)?;
        let dims = config.dims.unwrap_or_else(|| default_dims(&config.model));

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model)
                .with_cache_dir(config.cache_dir.clone())
                .with_show_download_progress(false),
        )
        .map_err(|e| load_err(e.to_string()))?;

        tracing::info!(model = %config.model, dims, "embedding model loaded");

        Ok(Self {
            model: Mutex::new(model),
            model_name: config.model.clone(),
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-models")]
impl Embedder for FastEmbedEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| Error::Inference(format!("local embedding failed: {}", e)))
    }
}

/// Output width of the known local models.
#[cfg(feature = "local-models")]
fn default_dims(model: &str) -> usize {
    match model {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

#[cfg(feature = "local-models")]
fn config_to_fastembed_model(name: &str) -> std::result::Result<fastembed::EmbeddingModel, String> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(format!(
            "unknown local embedding model '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        )),
    }
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`FastEmbedEmbedder`] (requires the `local-models` feature) |
/// | `"hash"` | `HashEmbedder` with `embedding.dims` |
///
/// Blocking: a local model is loaded (and downloaded on first run) here.
///
/// # Errors
///
/// Every failure is [`Error::ModelLoad`].
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        #[cfg(feature = "local-models")]
        "local" => Ok(Arc::new(FastEmbedEmbedder::new(config)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => Err(Error::ModelLoad {
            kind: ModelKind::Embedding,
            model: config.model.clone(),
            reason: "local embedding provider requires --features local-models".to_string(),
        }),
        "hash" => {
            let dims = config.dims.unwrap_or(0);
            let embedder = HashEmbedder::new(dims).map_err(|e| Error::ModelLoad {
                kind: ModelKind::Embedding,
                model: "hash".to_string(),
                reason: e.to_string(),
            })?;
            Ok(Arc::new(embedder))
        }
        other => Err(Error::ModelLoad {
            kind: ModelKind::Embedding,
            model: config.model.clone(),
            reason: format!("unknown embedding provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_provider() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "hash");
        assert_eq!(embedder.embed("hello").unwrap().len(), 32);
    }

    #[test]
    fn test_hash_provider_without_dims_fails_to_load() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: None,
            ..EmbeddingConfig::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(matches!(
            err,
            Error::ModelLoad {
                kind: ModelKind::Embedding,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[cfg(feature = "local-models")]
    #[test]
    fn test_unknown_local_model_is_load_error() {
        let config = EmbeddingConfig {
            model: "no-such-model".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("no-such-model"));
    }
}
