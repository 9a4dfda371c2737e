//! # Session Memory CLI (`smem`)
//!
//! ## Usage
//!
//! ```bash
//! smem --config ./config/smem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `smem init` | Create the index (SQLite schema or Chroma collection) |
//! | `smem ingest` | Ingest every journal in the journal directory |
//! | `smem ingest-file <path>` | Ingest a single journal |
//! | `smem query "<text>"` | Similarity search with optional filters |
//! | `smem similar "<task>"` | Past work similar to a task description |
//! | `smem examples positive\|negative` | Successes or failures |
//! | `smem get <id>` | Show one memory |
//! | `smem rate <id> <1-5>` | Rate a memory |
//! | `smem stats` | Index overview |
//!
//! ## Examples
//!
//! ```bash
//! smem ingest --dir ~/journals --limit 30
//! smem query "redis caching" --sentiment positive
//! smem query "auth" --file src/auth.rs --limit 3
//! smem query "deploy" --where '{"rating": {"$gte": 4}}'
//! smem examples negative --limit 5
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use session_memory::config::{self, Config};
use session_memory::ingest::IngestionPipeline;
use session_memory::search::QueryOptions;
use session_memory::{get, index, rate, search, stats};
use session_memory_core::models::SentimentLabel;

/// Session Memory CLI: semantic search over daily work journals.
#[derive(Parser)]
#[command(
    name = "smem",
    about = "Session Memory: semantic search over daily work journals",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index. Safe to run repeatedly.
    Init,

    /// Ingest every journal in a directory, oldest first.
    ///
    /// Documents that fail are reported and skipped.
    Ingest {
        /// Journal directory. Defaults to `ingest.journal_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Stop after this many documents.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ingest a single journal file.
    IngestFile { path: PathBuf },

    /// Similarity search over stored memories.
    Query {
        text: String,

        #[arg(long)]
        limit: Option<usize>,

        /// Outcome must contain this text.
        #[arg(long)]
        outcome: Option<String>,

        /// Entry must list this exact file.
        #[arg(long)]
        file: Option<String>,

        /// positive, negative, or neutral.
        #[arg(long)]
        sentiment: Option<String>,

        /// Raw where-clause JSON.
        #[arg(long = "where")]
        where_json: Option<String>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find past work similar to a task description.
    Similar {
        task: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Show past successes or failures.
    Examples {
        kind: ExampleKind,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Show one memory by id.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Rate a memory from 1 to 5.
    Rate {
        id: String,

        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
    },

    /// Show index statistics.
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExampleKind {
    Positive,
    Negative,
}

impl From<ExampleKind> for SentimentLabel {
    fn from(kind: ExampleKind) -> Self {
        match kind {
            ExampleKind::Positive => SentimentLabel::Positive,
            ExampleKind::Negative => SentimentLabel::Negative,
        }
    }
}

fn init_tracing(config: &Config) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg);

    let api = index::open_api(&cfg)
        .await
        .with_context(|| format!("failed to open index ({})", cfg.index.backend))?;

    match cli.command {
        Commands::Init => {
            println!("Index initialized: {}", api.index().describe());
        }
        Commands::Ingest { dir, limit } => {
            let dir = dir.unwrap_or_else(|| cfg.ingest.journal_dir.clone());
            let pipeline = IngestionPipeline::new(api.index().clone(), &cfg.ingest)?;
            let report = pipeline.process_all(&dir, limit).await?;

            println!("Ingest {}", dir.display());
            println!("  documents: {}", report.documents_processed);
            println!("  entries:   {}", report.total_entries);
            if !report.failures.is_empty() {
                println!("  failures:  {}", report.failures.len());
                for failure in &report.failures {
                    println!("    {}: {}", failure.path.display(), failure.error);
                }
            }
        }
        Commands::IngestFile { path } => {
            let pipeline = IngestionPipeline::new(api.index().clone(), &cfg.ingest)?;
            let entries = pipeline.process_document(&path).await?;
            println!("Ingested {} entries from {}", entries, path.display());
        }
        Commands::Query {
            text,
            limit,
            outcome,
            file,
            sentiment,
            where_json,
            json,
        } => {
            let options = QueryOptions {
                limit,
                outcome,
                file,
                sentiment,
                where_json,
                json,
            };
            search::run_query(&api, &text, &options).await?;
        }
        Commands::Similar { task, limit, json } => {
            search::run_similar(&api, &task, limit, json).await?;
        }
        Commands::Examples { kind, limit, json } => {
            search::run_examples(&api, kind.into(), limit, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&api, &id, json).await?;
        }
        Commands::Rate { id, rating } => {
            rate::run_rate(&api, &id, rating).await?;
        }
        Commands::Stats => {
            stats::run_stats(&api).await?;
        }
    }

    Ok(())
}
