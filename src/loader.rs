//! Input feed: marketplace review-export JSON.
//!
//! Exports come either as `{"reviews": [...]}` or as a bare array, and some
//! feeds double-encode individual items as JSON strings. The loader accepts
//! all three shapes, keeps only items for the requested product, and skips
//! items without a comment — there is nothing to analyze in a bare rating.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use crate::models::RawReview;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Export {
    Wrapped { reviews: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    id: serde_json::Value,
    #[serde(default)]
    subject: Option<FeedSubject>,
    #[serde(default)]
    rating: Option<FeedCode>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    language: Option<FeedCode>,
    #[serde(default)]
    country: Option<FeedCode>,
    #[serde(default)]
    author: Option<FeedAuthor>,
    #[serde(default, rename = "publisherDate")]
    publisher_date: Option<String>,
    #[serde(default)]
    attributes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FeedSubject {
    identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedCode {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedAuthor {
    username: Option<String>,
}

/// Load the reviews for one product from an export file.
///
/// Returns the matching reviews plus the count of items skipped as
/// undecodable, for the ingestion report.
pub fn load_reviews(path: &Path, product_id: &str) -> Result<(Vec<RawReview>, usize)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read review export: {}", path.display()))?;

    let export: Export = serde_json::from_str(&content)
        .with_context(|| format!("Malformed review export: {}", path.display()))?;

    let items = match export {
        Export::Wrapped { reviews } => reviews,
        Export::Bare(items) => items,
    };

    let mut reviews = Vec::new();
    let mut skipped = 0usize;

    for raw in items {
        // Some feeds double-encode items as JSON strings.
        let value = match raw {
            serde_json::Value::String(s) => match serde_json::from_str(&s) {
                Ok(v) => v,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            },
            other => other,
        };

        let item: FeedItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let identifier = item
            .subject
            .as_ref()
            .and_then(|s| s.identifier.as_deref());
        if identifier != Some(product_id) {
            continue;
        }

        let comment = match item.comment {
            Some(c) if !c.trim().is_empty() => c,
            _ => continue,
        };

        reviews.push(RawReview {
            id: id_to_string(&item.id),
            product_id: product_id.to_string(),
            rating_code: item.rating.and_then(|r| r.code),
            title: item.title.unwrap_or_default(),
            comment,
            language_code: item
                .language
                .and_then(|l| l.code)
                .unwrap_or_else(|| "tr".to_string()),
            country_code: item
                .country
                .and_then(|c| c.code)
                .unwrap_or_else(|| "TR".to_string()),
            author_username: item
                .author
                .and_then(|a| a.username)
                .unwrap_or_else(|| "anon".to_string()),
            publisher_date: item.publisher_date.as_deref().and_then(parse_date),
            attributes: if item.attributes.is_null() {
                serde_json::json!([])
            } else {
                item.attributes
            },
        });
    }

    Ok((reviews, skipped))
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
}
