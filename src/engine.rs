//! Engine context.
//!
//! [`Engine`] owns everything the pipelines share: the configuration, the
//! cached store handle, and the two model slots. There are no module-level
//! globals; the CLI builds one engine per process and tests build as many
//! as they like.
//!
//! ```rust,no_run
//! # async fn demo() -> ragpipe_core::Result<()> {
//! use ragpipe::config::Config;
//! use ragpipe::engine::Engine;
//!
//! let engine = Engine::new(Config::default());
//! let hits = engine.retrieve("how do I rotate credentials?", 5).await?;
//! for hit in hits {
//!     println!("{:.3} {}", hit.relevance_score, hit.chunk.source);
//! }
//! engine.close_client().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;

use ragpipe_core::embedding::Embedder;
use ragpipe_core::error::{ModelKind, Result};
use ragpipe_core::models::{Document, IngestResult, RankedChunk};
use ragpipe_core::rerank::Reranker;
use ragpipe_core::store::{StoreConnector, VectorStore};

use crate::client::ClientSlot;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::ingest;
use crate::rerank::create_reranker;
use crate::retrieve::{self, RetrieveOptions};
use crate::slot::ModelSlot;
use crate::weaviate::WeaviateConnector;

/// Builds an embedder. Called on a blocking thread.
pub type EmbedderFactory = Arc<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Builds a reranker. Called on a blocking thread.
pub type RerankerFactory = Arc<dyn Fn() -> Result<Arc<dyn Reranker>> + Send + Sync>;

/// Store and model state reported by [`Engine::status`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub endpoint: String,
    pub collection: String,
    pub collection_exists: bool,
    pub chunks: usize,
    pub embedder_loaded: bool,
    pub reranker_loaded: bool,
}

pub struct Engine {
    config: Config,
    client: ClientSlot,
    embedder: ModelSlot<dyn Embedder>,
    reranker: ModelSlot<dyn Reranker>,
    embedder_factory: EmbedderFactory,
    reranker_factory: RerankerFactory,
}

impl Engine {
    /// Engine backed by Weaviate and the configured model providers.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(WeaviateConnector::new(config.store.clone()));

        let embedding_config = config.embedding.clone();
        let embedder_factory: EmbedderFactory =
            Arc::new(move || create_embedder(&embedding_config));

        let reranker_config = config.reranker.clone();
        let cache_dir = config.embedding.cache_dir.clone();
        let reranker_factory: RerankerFactory =
            Arc::new(move || create_reranker(&reranker_config, &cache_dir));

        Self::with_components(config, connector, embedder_factory, reranker_factory)
    }

    /// Engine with an explicit store connector and model factories.
    pub fn with_components(
        config: Config,
        connector: Arc<dyn StoreConnector>,
        embedder_factory: EmbedderFactory,
        reranker_factory: RerankerFactory,
    ) -> Self {
        Self {
            config,
            client: ClientSlot::new(connector),
            embedder: ModelSlot::new(ModelKind::Embedding),
            reranker: ModelSlot::new(ModelKind::Reranking),
            embedder_factory,
            reranker_factory,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The cached store handle, connecting on first use or when the cached
    /// one is no longer ready.
    pub async fn get_client(&self) -> Result<Arc<dyn VectorStore>> {
        self.client.get().await
    }

    /// Close the cached store handle. Safe to call when none is open.
    pub async fn close_client(&self) {
        self.client.close().await
    }

    pub async fn get_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let factory = self.embedder_factory.clone();
        self.embedder
            .get_or_init(&self.config.embedding.model, move || factory())
            .await
    }

    pub async fn get_reranker(&self) -> Result<Arc<dyn Reranker>> {
        let factory = self.reranker_factory.clone();
        self.reranker
            .get_or_init(&self.config.reranker.model, move || factory())
            .await
    }

    /// Drop both cached models; the next use loads them again.
    pub fn reset_models(&self) {
        self.embedder.reset();
        self.reranker.reset();
    }

    /// Ingest documents into `collection` (default: `retrieval.collection`).
    pub async fn ingest(
        &self,
        documents: &[Document],
        collection: Option<&str>,
    ) -> Result<IngestResult> {
        let collection = collection.unwrap_or(&self.config.retrieval.collection);
        ingest::ingest_documents(self, documents, collection).await
    }

    /// Top-`k` chunks for `query` with the configured retrieval settings.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        self.retrieve_with(query, k, &RetrieveOptions::default())
            .await
    }

    pub async fn retrieve_with(
        &self,
        query: &str,
        k: usize,
        options: &RetrieveOptions,
    ) -> Result<Vec<RankedChunk>> {
        retrieve::retrieve(self, query, k, options).await
    }

    pub async fn status(&self, collection: Option<&str>) -> Result<EngineStatus> {
        let collection = collection.unwrap_or(&self.config.retrieval.collection);
        let client = self.get_client().await?;
        let exists = client.collection_exists(collection).await?;
        let chunks = if exists {
            client.count(collection).await?
        } else {
            0
        };
        Ok(EngineStatus {
            endpoint: client.endpoint().to_string(),
            collection: collection.to_string(),
            collection_exists: exists,
            chunks,
            embedder_loaded: self.embedder.is_loaded(),
            reranker_loaded: self.reranker.is_loaded(),
        })
    }
}
