//! # ragpipe CLI
//!
//! The `ragpipe` binary ingests a directory of text into a Weaviate
//! collection and answers queries with reranked chunks.
//!
//! ## Usage
//!
//! ```bash
//! ragpipe --config ./config/ragpipe.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragpipe ingest <dir>` | Chunk, embed and store every matching file under `<dir>` |
//! | `ragpipe query "<q>"` | Retrieve and rerank the top-k chunks |
//! | `ragpipe status` | Check the store and report the collection size |
//! | `ragpipe chunk <file>` | Show how a file would be chunked |
//!
//! Logs go to stderr; set `RUST_LOG` (default `info`) to adjust.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragpipe::commands::{self, QueryArgs};
use ragpipe::config;
use ragpipe::engine::Engine;

/// ragpipe: local retrieval-and-reranking over a Weaviate collection.
#[derive(Parser)]
#[command(
    name = "ragpipe",
    about = "ragpipe: local retrieval and reranking over a Weaviate collection",
    version,
    long_about = "ragpipe ingests documents into a Weaviate collection with client-side \
    embeddings, then answers queries by over-fetching candidates with hybrid or vector \
    search and reordering them with a cross-encoder."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragpipe.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/ragpipe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory of text files.
    ///
    /// Files are selected with `[ingest].include_globs`. Re-running on an
    /// unchanged tree writes nothing.
    Ingest {
        /// Directory to ingest.
        dir: PathBuf,

        /// Target collection (default: `[retrieval].collection`).
        #[arg(long)]
        collection: Option<String>,

        /// Show document and chunk counts without touching the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Retrieve the most relevant chunks for a query.
    Query {
        /// The query text.
        query: String,

        /// Number of results (default: `[retrieval].default_k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Candidates fetched per result before reranking.
        #[arg(long)]
        fetch_multiplier: Option<usize>,

        /// Collection to search (default: `[retrieval].collection`).
        #[arg(long)]
        collection: Option<String>,

        /// `hybrid` (keyword + vector) or `vector`.
        #[arg(long)]
        mode: Option<String>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check store readiness and collection size.
    Status {
        #[arg(long)]
        collection: Option<String>,
    },

    /// Print the chunk plan for a file. Does not contact the store.
    Chunk {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;
    let engine = Engine::new(cfg);

    let outcome = match cli.command {
        Commands::Ingest {
            dir,
            collection,
            dry_run,
        } => commands::run_ingest(&engine, &dir, collection.as_deref(), dry_run).await,
        Commands::Query {
            query,
            k,
            fetch_multiplier,
            collection,
            mode,
            json,
        } => {
            commands::run_query(
                &engine,
                QueryArgs {
                    query: &query,
                    k,
                    fetch_multiplier,
                    collection,
                    mode: mode.as_deref(),
                    json,
                },
            )
            .await
        }
        Commands::Status { collection } => {
            commands::run_status(&engine, collection.as_deref()).await
        }
        Commands::Chunk { file } => commands::run_chunk(engine.config(), &file),
    };

    engine.close_client().await;
    outcome
}
