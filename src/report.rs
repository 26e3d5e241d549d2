//! Read-side summary lookup.
//!
//! Fetches a product's stored summary. Used by the `rlens summary` CLI
//! command and the HTTP query surface; pure read, no pipeline logic.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::models::{ProductSummary, RankedPhrase};
use crate::store;

/// Summary response shape served over HTTP and printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub product_id: String,
    pub total_reviews: u64,
    pub top_pros: Vec<RankedPhrase>,
    pub top_cons: Vec<RankedPhrase>,
    pub top_complaints: Vec<RankedPhrase>,
    pub top_suggestions: Vec<RankedPhrase>,
    pub last_updated: String, // ISO8601
    pub sentiment: Vec<SentimentCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentCount {
    pub sentiment: String,
    pub count: i64,
}

/// Load the summary for a product, or `None` if no run has written one yet.
pub async fn load_summary(pool: &SqlitePool, product_id: &str) -> Result<Option<SummaryResponse>> {
    let summary = match store::get_summary(pool, product_id).await? {
        Some(summary) => summary,
        None => return Ok(None),
    };

    let sentiment = store::sentiment_breakdown(pool, product_id)
        .await?
        .into_iter()
        .map(|(s, count)| SentimentCount {
            sentiment: s.as_str().to_string(),
            count,
        })
        .collect();

    Ok(Some(to_response(summary, sentiment)))
}

fn to_response(summary: ProductSummary, sentiment: Vec<SentimentCount>) -> SummaryResponse {
    SummaryResponse {
        product_id: summary.product_id,
        total_reviews: summary.total_reviews,
        top_pros: summary.top_pros,
        top_cons: summary.top_cons,
        top_complaints: summary.top_complaints,
        top_suggestions: summary.top_suggestions,
        last_updated: summary.last_updated.to_rfc3339(),
        sentiment,
    }
}

/// CLI entry: print a product's summary, or fail if none exists.
pub async fn run_summary(config: &Config, product_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let summary = load_summary(&pool, product_id).await?;
    pool.close().await;

    let summary = match summary {
        Some(summary) => summary,
        None => bail!("no summary for product: {}", product_id),
    };

    println!("Product {}", summary.product_id);
    println!("  analyzed reviews: {}", summary.total_reviews);
    println!("  last updated:     {}", summary.last_updated);
    print_ranking("pros", &summary.top_pros);
    print_ranking("cons", &summary.top_cons);
    print_ranking("complaints", &summary.top_complaints);
    print_ranking("suggestions", &summary.top_suggestions);
    if !summary.sentiment.is_empty() {
        println!();
        println!("  sentiment:");
        for s in &summary.sentiment {
            println!("    {:<10} {}", s.sentiment, s.count);
        }
    }
    Ok(())
}

fn print_ranking(label: &str, ranking: &[RankedPhrase]) {
    println!();
    println!("  top {}:", label);
    if ranking.is_empty() {
        println!("    (none)");
        return;
    }
    for entry in ranking {
        println!("    {:>4}  {}", entry.count, entry.phrase);
    }
}
