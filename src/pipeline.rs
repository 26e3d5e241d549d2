//! Pipeline orchestration.
//!
//! Sequences ingestion → pending-work selection → extraction → summarization
//! for one product and reports per-run counts. Every stage is idempotent or
//! write-once, so a run can be aborted and resumed at any point:
//!
//! - ingestion is insert-if-absent by review id
//! - a review is "pending" precisely while it has no analysis row
//! - the analysis insert is write-once; a conflict means another writer
//!   finished first and is treated as already-analyzed
//! - the summary is recomputed from the full analysis set, never merged
//!
//! Extraction runs sequentially: the extractor is the bottleneck, and one
//! call in flight keeps the at-most-once write trivial. A failed extraction
//! leaves the review pending for the next run; nothing retries within a run.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::cluster::ClusterParams;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extractor::OpinionExtractor;
use crate::models::RawReview;
use crate::store::{self, AnalysisWrite};
use crate::summarize::{self, SummarizeOutcome};

/// Per-run counts and outcomes, for operator visibility.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Newly inserted review rows (ingestion phase, when one ran).
    pub ingested: u64,
    /// Input items skipped as undecodable by the loader.
    pub skipped_input: usize,
    /// Pending reviews fetched for this run.
    pub pending: usize,
    /// Analyses persisted this run.
    pub succeeded: usize,
    /// Reviews left pending after an extraction or persistence failure.
    pub failed: usize,
    /// Pending reviews that turned out to be analyzed by another writer.
    pub already_analyzed: usize,
    /// Out-of-vocabulary feature categories dropped during validation.
    pub dropped_categories: usize,
    /// One message per failed review.
    pub errors: Vec<String>,
    pub summary: SummaryOutcome,
}

/// How the always-run summarization phase ended.
#[derive(Debug, Default)]
pub enum SummaryOutcome {
    #[default]
    NotRun,
    Updated {
        total_reviews: u64,
    },
    NothingToSummarize,
    /// Clustering failed; the prior summary, if any, is untouched.
    Skipped {
        error: String,
    },
}

impl RunReport {
    pub fn print(&self, product_id: &str) {
        println!("run {}", product_id);
        println!("  ingested: {} new reviews", self.ingested);
        if self.skipped_input > 0 {
            println!("  skipped input items: {}", self.skipped_input);
        }
        println!("  pending considered: {}", self.pending);
        println!("  analyzed: {}", self.succeeded);
        println!("  failed: {}", self.failed);
        if self.already_analyzed > 0 {
            println!("  already analyzed elsewhere: {}", self.already_analyzed);
        }
        if self.dropped_categories > 0 {
            println!(
                "  dropped out-of-vocabulary categories: {}",
                self.dropped_categories
            );
        }
        for error in &self.errors {
            eprintln!("  warning: {}", error);
        }
        match &self.summary {
            SummaryOutcome::NotRun => println!("  summary: not run"),
            SummaryOutcome::Updated { total_reviews } => {
                println!("  summary: updated ({} reviews)", total_reviews)
            }
            SummaryOutcome::NothingToSummarize => {
                println!("  summary: skipped (nothing to summarize)")
            }
            SummaryOutcome::Skipped { error } => {
                println!("  summary: skipped ({})", error)
            }
        }
        println!("ok");
    }
}

/// Analyze up to `limit` pending reviews for a product.
///
/// Each review gets exactly one extractor call this run. Failures are
/// recorded and the review stays pending; validation drops out-of-list
/// feature categories instead of failing.
pub async fn analyze_pending(
    pool: &SqlitePool,
    extractor: &dyn OpinionExtractor,
    product_id: &str,
    limit: usize,
    report: &mut RunReport,
) -> Result<()> {
    let pending = store::pending_reviews(pool, product_id, limit).await?;
    report.pending = pending.len();

    for review in &pending {
        let mut fields = match extractor.extract(&review.comment).await {
            Ok(fields) => fields,
            Err(e) => {
                report.failed += 1;
                report
                    .errors
                    .push(format!("extraction failed for review {}: {}", review.id, e));
                continue;
            }
        };

        report.dropped_categories += fields.retain_known_categories();

        match store::insert_analysis(pool, &review.id, &fields).await {
            Ok(AnalysisWrite::Inserted) => report.succeeded += 1,
            Ok(AnalysisWrite::AlreadyAnalyzed) => report.already_analyzed += 1,
            Err(e) => {
                report.failed += 1;
                report
                    .errors
                    .push(format!("persisting analysis for review {} failed: {}", review.id, e));
            }
        }
    }

    Ok(())
}

/// Run the full pipeline for one product.
///
/// `reviews` is the already-parsed input feed; pass an empty slice to skip
/// ingestion and only work through the backlog. Summarization always runs,
/// even when nothing new was analyzed, so the summary also picks up rows
/// written by other producers.
pub async fn run_pipeline(
    config: &Config,
    pool: &SqlitePool,
    extractor: &dyn OpinionExtractor,
    embedder: &dyn Embedder,
    product_id: &str,
    reviews: &[RawReview],
) -> Result<RunReport> {
    let mut report = RunReport::default();

    if !reviews.is_empty() {
        report.ingested = store::insert_reviews(pool, reviews).await?;
    }

    analyze_pending(
        pool,
        extractor,
        product_id,
        config.pipeline.batch_limit,
        &mut report,
    )
    .await?;

    let params = ClusterParams::from(&config.clustering);
    report.summary = match summarize::summarize_product(pool, embedder, params, product_id).await {
        Ok(SummarizeOutcome::Updated(summary)) => SummaryOutcome::Updated {
            total_reviews: summary.total_reviews,
        },
        Ok(SummarizeOutcome::NothingToSummarize) => SummaryOutcome::NothingToSummarize,
        Err(e) => SummaryOutcome::Skipped {
            error: e.to_string(),
        },
    };

    Ok(report)
}
