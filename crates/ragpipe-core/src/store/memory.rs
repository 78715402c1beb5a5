//! In-memory [`VectorStore`] implementation for tests and offline runs.
//!
//! Collections are `Vec`s of rows behind `std::sync::RwLock`, kept in
//! insertion order so search ties resolve deterministically. Vector search
//! is brute-force cosine similarity; hybrid search blends it with the
//! fraction of query terms present in the chunk text.
//!
//! [`InMemoryStore::set_ready`] simulates an outage: while not ready, every
//! operation fails with [`Error::Connectivity`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{Candidate, Chunk, SearchMode, StoredChunkRef};

use super::{StoreConnector, VectorStore};

const ENDPOINT: &str = "memory://local";

struct StoredRow {
    chunk: Chunk,
    vector: Vec<f32>,
}

struct MemCollection {
    dims: usize,
    rows: Vec<StoredRow>,
}

/// In-memory store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
    ready: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Connectivity {
                endpoint: ENDPOINT.to_string(),
                reason: "store is not ready".to_string(),
            })
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dims_mismatch(collection: &str, stored: usize, requested: usize) -> Error {
    Error::Store(format!(
        "collection '{}' holds {}-dim vectors, embedder produces {}",
        collection, stored, requested
    ))
}

fn missing(collection: &str) -> Error {
    Error::Store(format!("collection '{}' does not exist", collection))
}

/// Fraction of distinct lowercase query terms that occur in `text`.
fn keyword_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let matches = terms
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count();
    matches as f32 / terms.len() as f32
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.contains_key(name))
    }

    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        self.check_available()?;
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let coll = collections
            .entry(name.to_string())
            .or_insert_with(|| MemCollection {
                dims,
                rows: Vec::new(),
            });
        if coll.dims != dims {
            if !coll.rows.is_empty() {
                return Err(dims_mismatch(name, coll.dims, dims));
            }
            coll.dims = dims;
        }
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        self.check_available()?;
        if chunks.len() != vectors.len() {
            return Err(Error::Validation(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        if let Some(v) = vectors.iter().find(|v| v.len() != coll.dims) {
            return Err(Error::Store(format!(
                "vector length {} does not match collection dims {}",
                v.len(),
                coll.dims
            )));
        }
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let row = StoredRow {
                chunk: chunk.clone(),
                vector: vector.clone(),
            };
            match coll.rows.iter_mut().find(|r| r.chunk.id == chunk.id) {
                Some(existing) => *existing = row,
                None => coll.rows.push(row),
            }
        }
        Ok(())
    }

    async fn source_chunks(&self, collection: &str, source: &str) -> Result<Vec<StoredChunkRef>> {
        self.check_available()?;
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };
        Ok(coll
            .rows
            .iter()
            .filter(|r| r.chunk.source == source)
            .map(|r| StoredChunkRef {
                id: r.chunk.id.clone(),
                content_hash: r.chunk.content_hash.clone(),
            })
            .collect())
    }

    async fn delete_chunks(&self, collection: &str, ids: &[String]) -> Result<()> {
        self.check_available()?;
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(coll) = collections.get_mut(collection) {
            coll.rows.retain(|r| !ids.contains(&r.chunk.id));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        vector: &[f32],
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<Candidate>> {
        self.check_available()?;
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let coll = collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;

        let mut terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        terms.sort();
        terms.dedup();

        let mut scored: Vec<(f32, &StoredRow)> = coll
            .rows
            .iter()
            .map(|row| {
                let sim = cosine_similarity(vector, &row.vector);
                let score = match mode {
                    SearchMode::Vector => sim,
                    SearchMode::Hybrid { alpha } => {
                        alpha * sim + (1.0 - alpha) * keyword_score(&terms, &row.chunk.text)
                    }
                };
                (score, row)
            })
            .collect();
        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (similarity, row))| Candidate {
                chunk: row.chunk.clone(),
                similarity,
                rank,
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.check_available()?;
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(collection).map(|c| c.rows.len()).unwrap_or(0))
    }
}

/// [`StoreConnector`] handing out one shared [`InMemoryStore`].
///
/// Counts successful connects so callers can observe handle caching.
pub struct MemoryConnector {
    store: Arc<InMemoryStore>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    fn endpoint(&self) -> String {
        ENDPOINT.to_string()
    }

    async fn connect(&self) -> Result<Arc<dyn VectorStore>> {
        self.store.check_available()?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_id, content_hash};

    fn chunk(source: &str, index: i64, text: &str) -> Chunk {
        Chunk {
            id: chunk_id(source, index),
            text: text.to_string(),
            source: source.to_string(),
            chunk_index: index,
            content_hash: content_hash(text),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 2).await.unwrap();
        let c = chunk("a.md", 0, "first");
        store
            .upsert_chunks("Docs", &[c.clone()], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        store
            .upsert_chunks("Docs", &[c], &[vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(store.count("Docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 2).await.unwrap();
        let chunks = vec![chunk("a.md", 0, "far"), chunk("a.md", 1, "near")];
        store
            .upsert_chunks("Docs", &chunks, &[vec![0.0, 1.0], vec![1.0, 0.1]])
            .await
            .unwrap();
        let hits = store
            .search("Docs", "q", &[1.0, 0.0], 10, SearchMode::Vector)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "near");
        assert_eq!(hits[0].rank, 0);
        assert_eq!(hits[1].rank, 1);
    }

    #[tokio::test]
    async fn test_hybrid_rewards_keyword_matches() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 2).await.unwrap();
        let chunks = vec![chunk("a.md", 0, "unrelated"), chunk("a.md", 1, "kubernetes")];
        store
            .upsert_chunks("Docs", &chunks, &[vec![1.0, 0.0], vec![1.0, 0.0]])
            .await
            .unwrap();
        let hits = store
            .search(
                "Docs",
                "kubernetes",
                &[1.0, 0.0],
                10,
                SearchMode::Hybrid { alpha: 0.5 },
            )
            .await
            .unwrap();
        assert_eq!(hits[0].chunk.text, "kubernetes");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 3).await.unwrap();
        let err = store
            .upsert_chunks("Docs", &[chunk("a.md", 0, "x")], &[vec![1.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn test_ensure_rejects_other_width_once_populated() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 3).await.unwrap();
        store.ensure_collection("Docs", 2).await.unwrap();
        store
            .upsert_chunks("Docs", &[chunk("a.md", 0, "x")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        store.ensure_collection("Docs", 2).await.unwrap();
        let err = store.ensure_collection("Docs", 4).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn test_outage_is_connectivity_error() {
        let store = InMemoryStore::new();
        store.set_ready(false);
        assert!(!store.is_ready().await);
        let err = store.collection_exists("Docs").await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_source_chunks_and_delete() {
        let store = InMemoryStore::new();
        store.ensure_collection("Docs", 1).await.unwrap();
        let chunks = vec![chunk("a.md", 0, "a0"), chunk("a.md", 1, "a1"), chunk("b.md", 0, "b0")];
        store
            .upsert_chunks("Docs", &chunks, &[vec![1.0], vec![1.0], vec![1.0]])
            .await
            .unwrap();
        let refs = store.source_chunks("Docs", "a.md").await.unwrap();
        assert_eq!(refs.len(), 2);
        store
            .delete_chunks("Docs", &[chunks[1].id.clone()])
            .await
            .unwrap();
        assert_eq!(store.count("Docs").await.unwrap(), 2);
        assert_eq!(store.source_chunks("Docs", "a.md").await.unwrap().len(), 1);
    }
}
