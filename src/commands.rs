//! CLI command handlers. Each prints its result to stdout.

use anyhow::{Context, Result};
use std::path::Path;

use ragpipe_core::chunk::chunk_text;

use crate::config::{parse_mode, Config};
use crate::engine::Engine;
use crate::loader::load_documents;
use crate::retrieve::RetrieveOptions;

pub async fn run_ingest(
    engine: &Engine,
    dir: &Path,
    collection: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let config = engine.config();
    let documents = load_documents(dir, &config.ingest)?;

    if dry_run {
        let policy = config.chunking.policy();
        let total_chunks: usize = documents
            .iter()
            .map(|d| chunk_text(&d.source, &d.text, &policy).len())
            .sum();
        println!("ingest {} (dry-run)", dir.display());
        println!("  documents found: {}", documents.len());
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    let result = engine
        .ingest(&documents, collection)
        .await
        .with_context(|| format!("Failed to ingest {}", dir.display()))?;

    println!("ingest {}", dir.display());
    println!("  collection: {}", result.collection);
    println!("  documents: {}", result.documents);
    println!("  unchanged: {}", result.documents_unchanged);
    println!("  chunks written: {}", result.chunks_written);
    println!("  chunks removed: {}", result.chunks_removed);
    println!("ok");
    Ok(())
}

pub struct QueryArgs<'a> {
    pub query: &'a str,
    pub k: Option<usize>,
    pub fetch_multiplier: Option<usize>,
    pub collection: Option<String>,
    pub mode: Option<&'a str>,
    pub json: bool,
}

pub async fn run_query(engine: &Engine, args: QueryArgs<'_>) -> Result<()> {
    let config = engine.config();
    let mode = match args.mode {
        Some(name) => Some(parse_mode(name, config.retrieval.hybrid_alpha).ok_or_else(|| {
            anyhow::anyhow!("Unknown mode: '{}'. Must be hybrid or vector.", name)
        })?),
        None => None,
    };
    let k = args.k.unwrap_or(config.retrieval.default_k);
    let options = RetrieveOptions {
        collection: args.collection,
        fetch_multiplier: args.fetch_multiplier,
        mode,
    };

    let results = engine.retrieve_with(args.query, k, &options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{} (retrieved #{}, similarity {:.3})",
            i + 1,
            r.relevance_score,
            r.chunk.source,
            r.chunk.chunk_index,
            r.retrieval_rank + 1,
            r.similarity_score
        );
        let snippet: String = r.chunk.text.chars().take(200).collect();
        println!("    {}", snippet.replace('\n', " "));
    }
    Ok(())
}

pub async fn run_status(engine: &Engine, collection: Option<&str>) -> Result<()> {
    let status = engine.status(collection).await?;
    println!("store: {} (ready)", status.endpoint);
    println!("collection: {}", status.collection);
    if status.collection_exists {
        println!("  chunks: {}", status.chunks);
    } else {
        println!("  (does not exist yet)");
    }
    Ok(())
}

/// Print the chunk plan for one file without touching the store.
pub fn run_chunk(config: &Config, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source = file.to_string_lossy();
    let chunks = chunk_text(&source, &text, &config.chunking.policy());

    println!("{}: {} chunk(s)", source, chunks.len());
    for c in &chunks {
        println!(
            "  #{} {} {} chars sha256:{}",
            c.chunk_index,
            c.id,
            c.text.chars().count(),
            &c.content_hash[..12]
        );
    }
    Ok(())
}
