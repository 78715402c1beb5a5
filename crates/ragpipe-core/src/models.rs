//! Core data models that flow through ingestion and retrieval.

use serde::Serialize;

/// A source document handed to the ingestion pipeline.
///
/// `source` is the document's identity: chunk ids are derived from it, so
/// the same document must always be ingested under the same name.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A stored unit of ingested text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// UUIDv5 of `(source, chunk_index)`.
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: i64,
    /// SHA-256 hex of `text`.
    pub content_hash: String,
}

/// Id and content hash of a chunk already in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunkRef {
    pub id: String,
    pub content_hash: String,
}

/// One vector-store hit, valid only within a single retrieval call.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    /// Store-reported similarity (higher is closer). Only comparable
    /// within one result set.
    pub similarity: f32,
    /// 0-based position in the store's result order.
    pub rank: usize,
}

/// A candidate after cross-encoder scoring; the unit `retrieve` returns.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub relevance_score: f32,
    pub similarity_score: f32,
    pub retrieval_rank: usize,
}

/// Summary of one `ingest` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub collection: String,
    /// Documents processed (including unchanged ones).
    pub documents: usize,
    /// Documents whose stored chunks already matched and were skipped.
    pub documents_unchanged: usize,
    pub chunks_written: usize,
    /// Stale chunks removed because a document shrank.
    pub chunks_removed: usize,
}

/// How the store should match candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// Pure nearest-neighbour search over the supplied vector.
    Vector,
    /// Store-side fusion of keyword (BM25) and vector scores;
    /// `alpha = 1.0` is pure vector, `0.0` pure keyword.
    Hybrid { alpha: f32 },
}
