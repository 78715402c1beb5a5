//! # ragpipe
//!
//! Local retrieval-and-reranking engine for RAG pipelines.
//!
//! Documents are chunked, embedded on the client, and written to a Weaviate
//! collection. At query time the query is embedded, an over-fetched set of
//! candidates comes back from hybrid (keyword + vector) or pure vector
//! search, and a cross-encoder reorders them before the top `k` are
//! returned.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Loader  │──▶│    Ingest    │──▶│ Weaviate │
//! │ (walkdir)│   │ Chunk+Embed  │   │  (REST)  │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │ candidates
//!                ┌──────────────┐   ┌────▼─────┐
//!   query ──────▶│   Retrieve   │──▶│  Rerank  │──▶ top k
//!                │ Embed+Search │   │ (cross-  │
//!                └──────────────┘   │ encoder) │
//!                                   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`engine`] | Context owning the store handle and model slots |
//! | [`client`] | Cached store handle |
//! | [`slot`] | Lazily loaded model instances |
//! | [`weaviate`] | Weaviate REST adapter |
//! | [`embedding`] | Embedding providers |
//! | [`rerank`] | Cross-encoder reranking provider |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Retrieval orchestrator |
//! | [`loader`] | Filesystem document loader |
//! | [`commands`] | CLI command handlers |
//!
//! Data models, the error type, the chunker and the store/model traits
//! live in the `ragpipe-core` crate.

pub mod client;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod loader;
pub mod rerank;
pub mod retrieve;
pub mod slot;
pub mod weaviate;

pub use ragpipe_core::{Error, Result};
