//! # Review Lens CLI (`rlens`)
//!
//! The `rlens` binary drives the review-analysis pipeline: database setup,
//! review ingestion, opinion extraction, summarization, and the read-side
//! query surface.
//!
//! ## Usage
//!
//! ```bash
//! rlens --config ./config/rlens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rlens init` | Create the SQLite database and schema |
//! | `rlens ingest <file> --product <id>` | Load a review export into the store |
//! | `rlens analyze --product <id>` | Extract opinions from pending reviews |
//! | `rlens summarize --product <id>` | Recompute a product's summary |
//! | `rlens run <file> --product <id>` | Full pipeline: ingest, analyze, summarize |
//! | `rlens summary <id>` | Print a product's stored summary |
//! | `rlens stats` | Database row counts and per-product progress |
//! | `rlens serve` | Serve summaries over HTTP |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use review_lens::cluster::ClusterParams;
use review_lens::{config, db, embedding, extractor, loader, migrate, pipeline, report, server, stats, store, summarize};

/// Review Lens — incremental review analysis with LLM opinion extraction
/// and semantic phrase-cluster summaries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rlens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rlens",
    about = "Review Lens — LLM opinion extraction and semantic review summaries",
    version,
    long_about = "Review Lens ingests free-text customer reviews, extracts structured opinion \
    fields via a language model, and produces deduplicated, frequency-ranked summaries \
    (top pros/cons/complaints/suggestions) per product. Re-running is always safe: each \
    review is analyzed at most once and summaries are recomputed from stored facts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and the raw_reviews, review_analysis, and
    /// analysis_summary tables. Idempotent — safe to re-run.
    Init,

    /// Ingest a review export file for one product.
    ///
    /// Insert-if-absent by review id: re-ingesting the same export is a
    /// no-op for already-stored reviews.
    Ingest {
        /// Path to the review export JSON file.
        file: PathBuf,

        /// Product identifier to ingest reviews for.
        #[arg(long)]
        product: String,
    },

    /// Analyze pending reviews for a product.
    ///
    /// Calls the configured opinion extractor once per pending review and
    /// persists each result write-once. Failed reviews stay pending for the
    /// next run. Does not touch the summary.
    Analyze {
        /// Product identifier.
        #[arg(long)]
        product: String,

        /// Maximum number of pending reviews to process this run
        /// (defaults to pipeline.batch_limit from config).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Recompute a product's summary from its analyzed reviews.
    Summarize {
        /// Product identifier.
        #[arg(long)]
        product: String,
    },

    /// Run the full pipeline: ingest, analyze pending, summarize.
    Run {
        /// Path to the review export JSON file.
        file: PathBuf,

        /// Product identifier.
        #[arg(long)]
        product: String,
    },

    /// Print a product's stored summary.
    Summary {
        /// Product identifier.
        product: String,
    },

    /// Show database row counts and per-product analysis progress.
    Stats,

    /// Serve stored summaries over HTTP.
    ///
    /// Binds to the address in `[server].bind`. Read-only.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, product } => {
            let (reviews, skipped) = loader::load_reviews(&file, &product)?;
            let pool = db::connect(&cfg).await?;
            let inserted = store::insert_reviews(&pool, &reviews).await?;
            pool.close().await;

            println!("ingest {}", product);
            println!("  matched in export: {}", reviews.len());
            if skipped > 0 {
                println!("  skipped input items: {}", skipped);
            }
            println!("  newly inserted: {}", inserted);
            println!("ok");
        }
        Commands::Analyze { product, limit } => {
            let extractor = extractor::create_extractor(&cfg.extractor)?;
            let pool = db::connect(&cfg).await?;
            let mut report = pipeline::RunReport::default();
            pipeline::analyze_pending(
                &pool,
                extractor.as_ref(),
                &product,
                limit.unwrap_or(cfg.pipeline.batch_limit),
                &mut report,
            )
            .await?;
            pool.close().await;
            report.print(&product);
        }
        Commands::Summarize { product } => {
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let pool = db::connect(&cfg).await?;
            let params = ClusterParams::from(&cfg.clustering);
            let outcome =
                summarize::summarize_product(&pool, embedder.as_ref(), params, &product).await?;
            pool.close().await;

            println!("summarize {}", product);
            match outcome {
                summarize::SummarizeOutcome::Updated(summary) => {
                    println!("  summary updated ({} reviews)", summary.total_reviews)
                }
                summarize::SummarizeOutcome::NothingToSummarize => {
                    println!("  nothing to summarize")
                }
            }
            println!("ok");
        }
        Commands::Run { file, product } => {
            let (reviews, skipped) = loader::load_reviews(&file, &product)?;
            let extractor = extractor::create_extractor(&cfg.extractor)?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let pool = db::connect(&cfg).await?;
            let mut report = pipeline::run_pipeline(
                &cfg,
                &pool,
                extractor.as_ref(),
                embedder.as_ref(),
                &product,
                &reviews,
            )
            .await?;
            pool.close().await;
            report.skipped_input = skipped;
            report.print(&product);
        }
        Commands::Summary { product } => {
            report::run_summary(&cfg, &product).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
