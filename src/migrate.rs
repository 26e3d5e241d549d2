//! Schema creation.
//!
//! Three tables: `raw_reviews` (append-only facts), `review_analysis`
//! (write-once per review; absence of a row is the "pending" state), and
//! `analysis_summary` (derived view, replaced wholesale by the summarizer).
//! All statements are idempotent so `rlens init` can be re-run safely.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on the given pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Raw reviews. rowid doubles as the stable insertion-order key used by
    // the pending-work query.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_reviews (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            rating_code TEXT,
            title TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL,
            language_code TEXT NOT NULL DEFAULT 'tr',
            country_code TEXT NOT NULL DEFAULT 'TR',
            author_username TEXT NOT NULL DEFAULT 'anon',
            publisher_date TEXT,
            attributes_json TEXT NOT NULL DEFAULT '[]',
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One analysis per review, write-once. The primary key enforces the
    // at-most-once invariant even under concurrent writers.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_analysis (
            review_id TEXT PRIMARY KEY,
            sentiment TEXT NOT NULL,
            sentiment_confidence REAL,
            pros_json TEXT NOT NULL DEFAULT '[]',
            cons_json TEXT NOT NULL DEFAULT '[]',
            complaints_json TEXT NOT NULL DEFAULT '[]',
            suggestions_json TEXT NOT NULL DEFAULT '[]',
            expectations_json TEXT NOT NULL DEFAULT '[]',
            feature_categories_json TEXT NOT NULL DEFAULT '[]',
            analyzed_at INTEGER NOT NULL,
            FOREIGN KEY (review_id) REFERENCES raw_reviews(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Derived summary, one row per product, replaced on every summarize run.
    // Each ranking is a typed JSON array of {phrase, count} in rank order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_summary (
            product_id TEXT PRIMARY KEY,
            total_reviews INTEGER NOT NULL,
            top_pros_json TEXT NOT NULL DEFAULT '[]',
            top_cons_json TEXT NOT NULL DEFAULT '[]',
            top_complaints_json TEXT NOT NULL DEFAULT '[]',
            top_suggestions_json TEXT NOT NULL DEFAULT '[]',
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_reviews_product ON raw_reviews(product_id)")
        .execute(pool)
        .await?;

    Ok(())
}
