use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ragpipe_core::chunk::ChunkPolicy;
use ragpipe_core::error::validate_collection_name;
use ragpipe_core::models::SearchMode;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            http_port: default_http_port(),
            grpc_port: default_grpc_port(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Base REST URL, e.g. `http://localhost:8080`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.http_port)
    }
}

fn default_scheme() -> String {
    "http".to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_grpc_port() -> u16 {
    50051
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "bge-small-en-v1.5".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".fastembed_cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_reranker_model(),
            batch_size: default_rerank_batch_size(),
        }
    }
}

fn default_reranker_model() -> String {
    "bge-reranker-base".to_string()
}
fn default_rerank_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            max_tokens: self.max_tokens,
            overlap_tokens: self.overlap_tokens,
        }
    }
}

fn default_max_tokens() -> usize {
    200
}
fn default_overlap() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            default_k: default_k(),
            fetch_multiplier: default_fetch_multiplier(),
            mode: default_mode(),
            hybrid_alpha: default_hybrid_alpha(),
        }
    }
}

impl RetrievalConfig {
    /// Search mode for `mode`, falling back to hybrid for unknown names.
    /// `load_config` rejects unknown names, so the fallback is only reached
    /// by hand-built configs.
    pub fn search_mode(&self) -> SearchMode {
        parse_mode(&self.mode, self.hybrid_alpha).unwrap_or(SearchMode::Hybrid {
            alpha: self.hybrid_alpha,
        })
    }
}

/// Parse `"hybrid"` / `"vector"`.
pub fn parse_mode(name: &str, alpha: f32) -> Option<SearchMode> {
    match name {
        "hybrid" => Some(SearchMode::Hybrid { alpha }),
        "vector" => Some(SearchMode::Vector),
        _ => None,
    }
}

fn default_collection() -> String {
    "Docs".to_string()
}
fn default_k() -> usize {
    5
}
fn default_fetch_multiplier() -> usize {
    4
}
fn default_mode() -> String {
    "hybrid".to_string()
}
fn default_hybrid_alpha() -> f32 {
    0.75
}

/// Which files `ragpipe ingest <dir>` picks up.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

/// Load and validate the config file. A missing file yields all defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Store
    match config.store.scheme.as_str() {
        "http" | "https" => {}
        other => anyhow::bail!("store.scheme must be http or https, got '{}'", other),
    }

    // Chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }

    // Retrieval
    if config.retrieval.default_k < 1 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }
    if config.retrieval.fetch_multiplier < 1 {
        anyhow::bail!("retrieval.fetch_multiplier must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        anyhow::bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if parse_mode(&config.retrieval.mode, config.retrieval.hybrid_alpha).is_none() {
        anyhow::bail!(
            "Unknown retrieval mode: '{}'. Must be hybrid or vector.",
            config.retrieval.mode
        );
    }
    validate_collection_name(&config.retrieval.collection)
        .with_context(|| "retrieval.collection is invalid")?;

    // Embedding
    match config.embedding.provider.as_str() {
        "local" => {}
        "hash" => {
            if config.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or hash.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Reranker
    match config.reranker.provider.as_str() {
        "local" => {}
        other => anyhow::bail!("Unknown reranker provider: '{}'. Must be local.", other),
    }
    if config.reranker.batch_size == 0 {
        anyhow::bail!("reranker.batch_size must be > 0");
    }

    Ok(())
}
