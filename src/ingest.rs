//! Ingestion pipeline.
//!
//! Per document: chunk → compare with what the store already holds for that
//! source → embed (one batch) → upsert → delete chunks the document no
//! longer produces.
//!
//! Chunk ids are derived from `(source, chunk_index)`, so writing the same
//! document twice overwrites rather than duplicates. A document whose ids
//! and content hashes all match the stored ones is skipped without being
//! embedded.
//!
//! Documents are committed one at a time. If embedding or writing fails,
//! the call returns the error; documents before the failing one stay
//! written and nothing of the failing one has been written.

use std::collections::HashSet;

use ragpipe_core::chunk::chunk_text;
use ragpipe_core::error::{validate_collection_name, Result};
use ragpipe_core::models::{Chunk, Document, IngestResult, StoredChunkRef};

use crate::embedding::embed_texts;
use crate::engine::Engine;

#[tracing::instrument(skip(engine, documents), fields(documents = documents.len()))]
pub async fn ingest_documents(
    engine: &Engine,
    documents: &[Document],
    collection: &str,
) -> Result<IngestResult> {
    validate_collection_name(collection)?;
    let policy = engine.config().chunking.policy();

    let client = engine.get_client().await?;
    let embedder = engine.get_embedder().await?;
    client.ensure_collection(collection, embedder.dims()).await?;

    let started = std::time::Instant::now();
    let mut result = IngestResult {
        collection: collection.to_string(),
        ..IngestResult::default()
    };

    for doc in documents {
        let chunks = chunk_text(&doc.source, &doc.text, &policy);
        let stored = client.source_chunks(collection, &doc.source).await?;
        result.documents += 1;

        if is_unchanged(&chunks, &stored) {
            tracing::debug!(source = %doc.source, chunks = chunks.len(), "unchanged, skipped");
            result.documents_unchanged += 1;
            continue;
        }

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_texts(embedder.clone(), texts).await?;
            client.upsert_chunks(collection, &chunks, &vectors).await?;
            result.chunks_written += chunks.len();
        }

        let stale = stale_ids(&chunks, &stored);
        if !stale.is_empty() {
            client.delete_chunks(collection, &stale).await?;
            result.chunks_removed += stale.len();
        }

        tracing::debug!(
            source = %doc.source,
            written = chunks.len(),
            removed = stale.len(),
            "document ingested"
        );
    }

    tracing::info!(
        collection,
        documents = result.documents,
        unchanged = result.documents_unchanged,
        chunks_written = result.chunks_written,
        chunks_removed = result.chunks_removed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingest complete"
    );

    Ok(result)
}

/// True when the store holds exactly these chunks: same ids, same hashes.
fn is_unchanged(chunks: &[Chunk], stored: &[StoredChunkRef]) -> bool {
    if chunks.len() != stored.len() {
        return false;
    }
    let stored: HashSet<(&str, &str)> = stored
        .iter()
        .map(|s| (s.id.as_str(), s.content_hash.as_str()))
        .collect();
    chunks
        .iter()
        .all(|c| stored.contains(&(c.id.as_str(), c.content_hash.as_str())))
}

/// Ids in the store that the new chunk set no longer contains.
fn stale_ids(chunks: &[Chunk], stored: &[StoredChunkRef]) -> Vec<String> {
    let current: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    stored
        .iter()
        .filter(|s| !current.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpipe_core::chunk::ChunkPolicy;

    fn refs(chunks: &[Chunk]) -> Vec<StoredChunkRef> {
        chunks
            .iter()
            .map(|c| StoredChunkRef {
                id: c.id.clone(),
                content_hash: c.content_hash.clone(),
            })
            .collect()
    }

    #[test]
    fn test_unchanged_detection() {
        let policy = ChunkPolicy::default();
        let chunks = chunk_text("a.md", "alpha beta gamma", &policy);
        assert!(is_unchanged(&chunks, &refs(&chunks)));

        let edited = chunk_text("a.md", "alpha beta delta", &policy);
        assert!(!is_unchanged(&edited, &refs(&chunks)));
        assert!(!is_unchanged(&chunks, &[]));
        assert!(is_unchanged(&[], &[]));
    }

    #[test]
    fn test_stale_ids_after_shrink() {
        let policy = ChunkPolicy {
            max_tokens: 3,
            overlap_tokens: 0,
        };
        let long = chunk_text("a.md", &"word ".repeat(40), &policy);
        let short = chunk_text("a.md", "word word", &policy);
        assert!(long.len() > short.len());

        let stale = stale_ids(&short, &refs(&long));
        assert_eq!(stale.len(), long.len() - short.len());
        assert!(!stale.contains(&short[0].id));
    }
}
