//! Product summarization.
//!
//! Recomputes a product's summary from the full set of its analyzed reviews:
//! concatenate each text-bearing field across all analyses, cluster each
//! multiset independently, and replace the stored summary wholesale. Nothing
//! is merged incrementally — the summary is a pure function of the analysis
//! table at the time it runs.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::cluster::{cluster_and_count, ClusterParams};
use crate::embedding::Embedder;
use crate::models::ProductSummary;
use crate::store;

/// Result of a summarize call.
#[derive(Debug, Clone)]
pub enum SummarizeOutcome {
    /// The summary row was replaced.
    Updated(ProductSummary),
    /// No analyses exist for the product; nothing was written. An absent
    /// summary is distinct from an empty one.
    NothingToSummarize,
}

/// Summarize one product.
///
/// An embedding failure propagates as an error before anything is written,
/// so a prior summary is never partially overwritten.
pub async fn summarize_product(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    params: ClusterParams,
    product_id: &str,
) -> Result<SummarizeOutcome> {
    let fields = store::fetch_product_fields(pool, product_id).await?;

    if fields.analyzed_reviews == 0 {
        return Ok(SummarizeOutcome::NothingToSummarize);
    }

    let top_pros = cluster_and_count(embedder, params, &fields.pros).await?;
    let top_cons = cluster_and_count(embedder, params, &fields.cons).await?;
    let top_complaints = cluster_and_count(embedder, params, &fields.complaints).await?;
    let top_suggestions = cluster_and_count(embedder, params, &fields.suggestions).await?;

    let summary = ProductSummary {
        product_id: product_id.to_string(),
        total_reviews: fields.analyzed_reviews,
        top_pros,
        top_cons,
        top_complaints,
        top_suggestions,
        last_updated: Utc::now(),
    };

    store::upsert_summary(pool, &summary).await?;
    Ok(SummarizeOutcome::Updated(summary))
}
