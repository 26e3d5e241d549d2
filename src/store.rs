//! Store contracts over the three pipeline tables.
//!
//! Raw reviews and analyses are append-only facts; the summary is a derived,
//! replaceable view. Everything here is keyed by plain `id`/`review_id`/
//! `product_id` strings — no live object references cross this boundary.
//!
//! Connectivity failures surface as errors; an empty result always means
//! "truly nothing there", never a swallowed failure.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{AnalysisFields, PendingReview, ProductSummary, RankedPhrase, RawReview, Sentiment};

/// Outcome of a write-once analysis insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisWrite {
    Inserted,
    /// Another writer already persisted an analysis for this review.
    /// Benign: the review is simply no longer pending.
    AlreadyAnalyzed,
}

/// Bulk insert reviews with insert-if-absent semantics.
///
/// Safe to call repeatedly with overlapping input; rows with an already-seen
/// `id` are skipped. Returns how many rows were newly added (observability
/// only — callers must not branch on it for correctness).
pub async fn insert_reviews(pool: &SqlitePool, reviews: &[RawReview]) -> Result<u64> {
    let now = Utc::now().timestamp();
    let mut inserted = 0u64;

    for review in reviews {
        let result = sqlx::query(
            r#"
            INSERT INTO raw_reviews (id, product_id, rating_code, title, comment,
                                     language_code, country_code, author_username,
                                     publisher_date, attributes_json, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&review.id)
        .bind(&review.product_id)
        .bind(&review.rating_code)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(&review.language_code)
        .bind(&review.country_code)
        .bind(&review.author_username)
        .bind(review.publisher_date.map(|d| d.to_rfc3339()))
        .bind(review.attributes.to_string())
        .bind(now)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Reviews for `product_id` that have no analysis record yet.
///
/// Ordered by insertion order (rowid) so repeated runs make forward progress
/// over a stable sequence. Result size bounded by `limit`.
pub async fn pending_reviews(
    pool: &SqlitePool,
    product_id: &str,
    limit: usize,
) -> Result<Vec<PendingReview>> {
    let rows = sqlx::query(
        r#"
        SELECT rr.id, rr.comment
        FROM raw_reviews rr
        LEFT JOIN review_analysis ra ON ra.review_id = rr.id
        WHERE ra.review_id IS NULL AND rr.product_id = ?
        ORDER BY rr.rowid
        LIMIT ?
        "#,
    )
    .bind(product_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingReview {
            id: row.get("id"),
            comment: row.get("comment"),
        })
        .collect())
}

/// Persist the extracted fields for one review, write-once.
///
/// A primary-key conflict means another writer got there first; that is
/// reported as [`AnalysisWrite::AlreadyAnalyzed`], not an error. Any other
/// database failure propagates and leaves the review pending.
pub async fn insert_analysis(
    pool: &SqlitePool,
    review_id: &str,
    fields: &AnalysisFields,
) -> Result<AnalysisWrite> {
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO review_analysis (review_id, sentiment, sentiment_confidence,
                                     pros_json, cons_json, complaints_json,
                                     suggestions_json, expectations_json,
                                     feature_categories_json, analyzed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(review_id)
    .bind(fields.sentiment.as_str())
    .bind(fields.sentiment_confidence)
    .bind(serde_json::to_string(&fields.pros)?)
    .bind(serde_json::to_string(&fields.cons)?)
    .bind(serde_json::to_string(&fields.complaints)?)
    .bind(serde_json::to_string(&fields.suggestions)?)
    .bind(serde_json::to_string(&fields.expectations)?)
    .bind(serde_json::to_string(&fields.feature_categories)?)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(AnalysisWrite::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(AnalysisWrite::AlreadyAnalyzed)
        }
        Err(e) => Err(e.into()),
    }
}

/// The four phrase multisets of a product, concatenated across all of its
/// analyzed reviews, plus the distinct review count.
#[derive(Debug, Default, Clone)]
pub struct ProductFields {
    pub analyzed_reviews: u64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub complaints: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Fetch every analysis belonging to `product_id` and concatenate its
/// text-bearing fields. `analyzed_reviews` counts rows, not phrases.
pub async fn fetch_product_fields(pool: &SqlitePool, product_id: &str) -> Result<ProductFields> {
    let rows = sqlx::query(
        r#"
        SELECT ra.pros_json, ra.cons_json, ra.complaints_json, ra.suggestions_json
        FROM review_analysis ra
        JOIN raw_reviews rr ON rr.id = ra.review_id
        WHERE rr.product_id = ?
        ORDER BY rr.rowid
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    let mut fields = ProductFields::default();
    for row in &rows {
        fields.analyzed_reviews += 1;
        decode_phrases(row.get("pros_json"), &mut fields.pros)?;
        decode_phrases(row.get("cons_json"), &mut fields.cons)?;
        decode_phrases(row.get("complaints_json"), &mut fields.complaints)?;
        decode_phrases(row.get("suggestions_json"), &mut fields.suggestions)?;
    }

    Ok(fields)
}

fn decode_phrases(json: String, out: &mut Vec<String>) -> Result<()> {
    let phrases: Vec<String> = serde_json::from_str(&json)?;
    out.extend(phrases);
    Ok(())
}

/// Replace-on-conflict upsert of a product summary.
pub async fn upsert_summary(pool: &SqlitePool, summary: &ProductSummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_summary (product_id, total_reviews, top_pros_json,
                                      top_cons_json, top_complaints_json,
                                      top_suggestions_json, last_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(product_id) DO UPDATE SET
            total_reviews = excluded.total_reviews,
            top_pros_json = excluded.top_pros_json,
            top_cons_json = excluded.top_cons_json,
            top_complaints_json = excluded.top_complaints_json,
            top_suggestions_json = excluded.top_suggestions_json,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(&summary.product_id)
    .bind(summary.total_reviews as i64)
    .bind(serde_json::to_string(&summary.top_pros)?)
    .bind(serde_json::to_string(&summary.top_cons)?)
    .bind(serde_json::to_string(&summary.top_complaints)?)
    .bind(serde_json::to_string(&summary.top_suggestions)?)
    .bind(summary.last_updated.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the stored summary for a product, if one has been written.
pub async fn get_summary(pool: &SqlitePool, product_id: &str) -> Result<Option<ProductSummary>> {
    let row = sqlx::query(
        r#"
        SELECT product_id, total_reviews, top_pros_json, top_cons_json,
               top_complaints_json, top_suggestions_json, last_updated
        FROM analysis_summary
        WHERE product_id = ?
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let total_reviews: i64 = row.get("total_reviews");
    let last_updated: i64 = row.get("last_updated");

    Ok(Some(ProductSummary {
        product_id: row.get("product_id"),
        total_reviews: total_reviews as u64,
        top_pros: decode_ranking(row.get("top_pros_json"))?,
        top_cons: decode_ranking(row.get("top_cons_json"))?,
        top_complaints: decode_ranking(row.get("top_complaints_json"))?,
        top_suggestions: decode_ranking(row.get("top_suggestions_json"))?,
        last_updated: DateTime::<Utc>::from_timestamp(last_updated, 0).unwrap_or_else(Utc::now),
    }))
}

fn decode_ranking(json: String) -> Result<Vec<RankedPhrase>> {
    Ok(serde_json::from_str(&json)?)
}

/// Per-table row counts for the stats command.
#[derive(Debug, Clone, Copy)]
pub struct TableCounts {
    pub reviews: i64,
    pub analyses: i64,
    pub summaries: i64,
}

pub async fn table_counts(pool: &SqlitePool) -> Result<TableCounts> {
    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_reviews")
        .fetch_one(pool)
        .await?;
    let analyses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_analysis")
        .fetch_one(pool)
        .await?;
    let summaries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_summary")
        .fetch_one(pool)
        .await?;
    Ok(TableCounts {
        reviews,
        analyses,
        summaries,
    })
}

/// Per-product review/analysis counts for the stats command.
pub async fn product_counts(pool: &SqlitePool) -> Result<Vec<(String, i64, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT rr.product_id,
               COUNT(*) AS review_count,
               COUNT(ra.review_id) AS analyzed_count
        FROM raw_reviews rr
        LEFT JOIN review_analysis ra ON ra.review_id = rr.id
        GROUP BY rr.product_id
        ORDER BY rr.product_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get("product_id"),
                row.get("review_count"),
                row.get("analyzed_count"),
            )
        })
        .collect())
}

/// Sentiment of a stored analysis, for the read-side surface.
pub async fn sentiment_breakdown(pool: &SqlitePool, product_id: &str) -> Result<Vec<(Sentiment, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT ra.sentiment, COUNT(*) AS n
        FROM review_analysis ra
        JOIN raw_reviews rr ON rr.id = ra.review_id
        WHERE rr.product_id = ?
        GROUP BY ra.sentiment
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let s: String = row.get("sentiment");
            Sentiment::parse(&s).map(|s| (s, row.get("n")))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;
    use crate::models::Sentiment;

    fn review(id: &str, product: &str, comment: &str) -> RawReview {
        RawReview {
            id: id.to_string(),
            product_id: product.to_string(),
            rating_code: Some("5".to_string()),
            title: String::new(),
            comment: comment.to_string(),
            language_code: "tr".to_string(),
            country_code: "TR".to_string(),
            author_username: "anon".to_string(),
            publisher_date: None,
            attributes: serde_json::json!([]),
        }
    }

    fn fields(pros: &[&str]) -> AnalysisFields {
        AnalysisFields {
            sentiment: Sentiment::Positive,
            sentiment_confidence: Some(0.8),
            pros: pros.iter().map(|s| s.to_string()).collect(),
            cons: vec![],
            complaints: vec![],
            suggestions: vec![],
            expectations: vec![],
            feature_categories: vec![],
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn insert_reviews_is_idempotent() {
        let pool = test_pool().await;
        let batch = vec![review("r1", "P", "good"), review("r2", "P", "bad")];

        let first = insert_reviews(&pool, &batch).await.unwrap();
        assert_eq!(first, 2);

        let second = insert_reviews(&pool, &batch).await.unwrap();
        assert_eq!(second, 0);

        let counts = table_counts(&pool).await.unwrap();
        assert_eq!(counts.reviews, 2);
    }

    #[tokio::test]
    async fn pending_is_insertion_ordered_and_bounded() {
        let pool = test_pool().await;
        let batch = vec![
            review("b", "P", "second"),
            review("a", "P", "first"),
            review("c", "Q", "other product"),
        ];
        insert_reviews(&pool, &batch).await.unwrap();

        let pending = pending_reviews(&pool, "P", 10).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let bounded = pending_reviews(&pool, "P", 1).await.unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].id, "b");
    }

    #[tokio::test]
    async fn analysis_write_is_at_most_once() {
        let pool = test_pool().await;
        insert_reviews(&pool, &[review("r1", "P", "good")])
            .await
            .unwrap();

        let first = insert_analysis(&pool, "r1", &fields(&["soft"])).await.unwrap();
        assert_eq!(first, AnalysisWrite::Inserted);

        let second = insert_analysis(&pool, "r1", &fields(&["other"])).await.unwrap();
        assert_eq!(second, AnalysisWrite::AlreadyAnalyzed);

        // The first write wins; the review is no longer pending.
        let pending = pending_reviews(&pool, "P", 10).await.unwrap();
        assert!(pending.is_empty());

        let product = fetch_product_fields(&pool, "P").await.unwrap();
        assert_eq!(product.analyzed_reviews, 1);
        assert_eq!(product.pros, vec!["soft".to_string()]);
    }

    #[tokio::test]
    async fn summary_upsert_replaces_previous_row() {
        let pool = test_pool().await;
        let mut summary = ProductSummary {
            product_id: "P".to_string(),
            total_reviews: 3,
            top_pros: vec![RankedPhrase {
                phrase: "comfy".to_string(),
                count: 3,
            }],
            top_cons: vec![],
            top_complaints: vec![],
            top_suggestions: vec![],
            last_updated: Utc::now(),
        };
        upsert_summary(&pool, &summary).await.unwrap();

        summary.total_reviews = 5;
        summary.top_pros = vec![RankedPhrase {
            phrase: "warm".to_string(),
            count: 5,
        }];
        upsert_summary(&pool, &summary).await.unwrap();

        let stored = get_summary(&pool, "P").await.unwrap().unwrap();
        assert_eq!(stored.total_reviews, 5);
        assert_eq!(stored.top_pros[0].phrase, "warm");

        let counts = table_counts(&pool).await.unwrap();
        assert_eq!(counts.summaries, 1);
    }

    #[tokio::test]
    async fn missing_summary_reads_as_none() {
        let pool = test_pool().await;
        assert!(get_summary(&pool, "nope").await.unwrap().is_none());
    }
}
