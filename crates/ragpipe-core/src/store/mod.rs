//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers every store operation the ingestion and
//! retrieval pipelines need, so backends are pluggable: the `ragpipe` app
//! crate ships a Weaviate REST implementation, and [`memory`] provides an
//! in-process one for tests and offline use.
//!
//! A [`StoreConnector`] knows how to open a handle; the engine caches the
//! handle it returns and asks the connector again only after the handle is
//! closed or stops reporting ready.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Candidate, Chunk, SearchMode, StoredChunkRef};

/// Abstract vector store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`is_ready`](VectorStore::is_ready) | Liveness/readiness probe, never errors |
/// | [`collection_exists`](VectorStore::collection_exists) | Existence check |
/// | [`ensure_collection`](VectorStore::ensure_collection) | Idempotent create with client-supplied vectors |
/// | [`upsert_chunks`](VectorStore::upsert_chunks) | Write chunks + vectors, overwriting by id |
/// | [`source_chunks`](VectorStore::source_chunks) | Ids and hashes already stored for one source |
/// | [`delete_chunks`](VectorStore::delete_chunks) | Remove chunks by id |
/// | [`search`](VectorStore::search) | Vector or hybrid similarity search |
/// | [`count`](VectorStore::count) | Number of chunks in a collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Human-readable address, used in errors and logs.
    fn endpoint(&self) -> &str;

    /// Probe readiness. Transient failures return `false`.
    async fn is_ready(&self) -> bool;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create the collection if absent, declaring `dims`-long vectors
    /// supplied by the client. Succeeds if it already exists, unless it
    /// already holds vectors of another width (`Error::Store`).
    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()>;

    /// Write `chunks[i]` with `vectors[i]`. An existing chunk with the same
    /// id is replaced.
    async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// Ids and content hashes of every stored chunk whose source is `source`.
    async fn source_chunks(&self, collection: &str, source: &str) -> Result<Vec<StoredChunkRef>>;

    async fn delete_chunks(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Return up to `limit` candidates, best first, with `rank` set to the
    /// position in that order.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        vector: &[f32],
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<Candidate>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Release the handle's resources. Further calls may fail.
    async fn close(&self) {}
}

/// Opens [`VectorStore`] handles.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Address the connector targets.
    fn endpoint(&self) -> String;

    /// Open a handle and confirm the store is ready.
    ///
    /// Failures are [`Error::Connectivity`](crate::error::Error::Connectivity).
    async fn connect(&self) -> Result<Arc<dyn VectorStore>>;
}
