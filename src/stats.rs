//! Database statistics overview.
//!
//! A quick look at pipeline progress: how many reviews are stored, how many
//! have been analyzed, and which products carry a summary. Used by
//! `rlens stats` to confirm runs are making forward progress.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let counts = store::table_counts(&pool).await?;
    let products = store::product_counts(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Review Lens — Database Stats");
    println!("============================");
    println!();
    println!("  Database:   {}", config.db.path.display());
    println!("  Size:       {}", format_bytes(db_size));
    println!();
    println!("  Reviews:    {}", counts.reviews);
    println!("  Analyzed:   {}", counts.analyses);
    println!("  Summaries:  {}", counts.summaries);

    if !products.is_empty() {
        println!();
        println!("  {:<24} {:>10} {:>10} {:>10}", "PRODUCT", "REVIEWS", "ANALYZED", "PENDING");
        for (product_id, reviews, analyzed) in &products {
            println!(
                "  {:<24} {:>10} {:>10} {:>10}",
                product_id,
                reviews,
                analyzed,
                reviews - analyzed
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
