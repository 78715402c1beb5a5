//! # ragpipe core
//!
//! Runtime-agnostic logic for ragpipe: data models, the error taxonomy,
//! the window chunker, the [`Embedder`](embedding::Embedder) and
//! [`Reranker`](rerank::Reranker) model interfaces, the
//! [`VectorStore`](store::VectorStore) abstraction with an in-memory
//! implementation, and the candidate ranking step.
//!
//! This crate contains no tokio, HTTP client, or model runtime. Concrete
//! providers (fastembed, Weaviate) live in the `ragpipe` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rerank;
pub mod search;
pub mod store;

pub use error::{Error, Result};
