//! Core data models used throughout Review Lens.
//!
//! These types represent the raw reviews, extracted opinion fields, and
//! derived product summaries that flow through the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed vocabulary of product feature categories.
///
/// The extractor is prompted with this list and the orchestrator drops any
/// returned category that is not on it. The list is fixed; extending it is a
/// schema change, not a runtime concern.
pub const FEATURE_CATEGORIES: &[&str] = &[
    "ease of use",
    "material quality",
    "pricing",
    "durability",
    "delivery speed",
    "packaging quality",
    "design aesthetics",
    "ease of setup",
    "seller responsiveness",
    "size compatibility",
    "product match with listing",
    "meeting expectations",
    "eco-friendliness",
    "availability",
    "noise level",
    "battery life",
    "discount",
    "payment options",
    "return process",
    "spare parts",
    "warranty",
    "technical support",
    "brand trust",
    "stock issue",
];

/// Overall tone of a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// A raw customer review as produced by the input feed.
///
/// Identity is `id`; re-ingesting the same id is a no-op. Immutable once
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReview {
    pub id: String,
    pub product_id: String,
    pub rating_code: Option<String>,
    pub title: String,
    pub comment: String,
    pub language_code: String,
    pub country_code: String,
    pub author_username: String,
    pub publisher_date: Option<DateTime<Utc>>,
    /// Opaque marketplace attribute blob, stored verbatim.
    pub attributes: serde_json::Value,
}

/// Structured opinion fields returned by the Opinion Extractor for one review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFields {
    pub sentiment: Sentiment,
    #[serde(default)]
    pub sentiment_confidence: Option<f64>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub complaints: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub expectations: Vec<String>,
    #[serde(default)]
    pub feature_categories: Vec<String>,
}

impl AnalysisFields {
    /// Drop feature categories outside the fixed vocabulary and rewrite the
    /// survivors to the vocabulary's spelling, so stored categories draw from
    /// exactly the listed values.
    ///
    /// Out-of-list values from the extractor are a validation correction,
    /// not a failure. Returns how many entries were dropped.
    pub fn retain_known_categories(&mut self) -> usize {
        let raw = std::mem::take(&mut self.feature_categories);
        let before = raw.len();
        self.feature_categories = raw
            .into_iter()
            .filter_map(|c| {
                let needle = c.trim().to_lowercase();
                FEATURE_CATEGORIES
                    .iter()
                    .find(|known| **known == needle)
                    .map(|known| known.to_string())
            })
            .collect();
        before - self.feature_categories.len()
    }
}

/// A `(id, comment)` pair for a review awaiting analysis.
#[derive(Debug, Clone)]
pub struct PendingReview {
    pub id: String,
    pub comment: String,
}

/// One representative phrase with its occurrence count across a product's
/// analyzed reviews. Ordering within a ranking is by descending count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPhrase {
    pub phrase: String,
    pub count: u64,
}

/// Derived per-product summary, fully recomputable from the analysis table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: String,
    /// Count of distinct analyzed reviews, not the sum of phrase counts.
    pub total_reviews: u64,
    pub top_pros: Vec<RankedPhrase>,
    pub top_cons: Vec<RankedPhrase>,
    pub top_complaints: Vec<RankedPhrase>,
    pub top_suggestions: Vec<RankedPhrase>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_roundtrip() {
        for s in ["positive", "negative", "neutral"] {
            assert_eq!(Sentiment::parse(s).unwrap().as_str(), s);
        }
        assert!(Sentiment::parse("mixed").is_none());
    }

    #[test]
    fn unknown_categories_are_dropped_not_fatal() {
        let mut fields = AnalysisFields {
            sentiment: Sentiment::Positive,
            sentiment_confidence: Some(0.9),
            pros: vec!["soft fabric".into()],
            cons: vec![],
            complaints: vec![],
            suggestions: vec![],
            expectations: vec![],
            feature_categories: vec![
                "material quality".into(),
                "Pricing".into(),
                "teleportation".into(),
            ],
        };
        let dropped = fields.retain_known_categories();
        assert_eq!(dropped, 1);
        // Survivors are rewritten to the vocabulary spelling.
        assert_eq!(
            fields.feature_categories,
            vec!["material quality".to_string(), "pricing".to_string()]
        );
    }

    #[test]
    fn kept_categories_use_vocabulary_spelling() {
        let mut fields = AnalysisFields {
            sentiment: Sentiment::Neutral,
            sentiment_confidence: None,
            pros: vec![],
            cons: vec![],
            complaints: vec![],
            suggestions: vec![],
            expectations: vec![],
            feature_categories: vec!["  DELIVERY SPEED ".into(), "Brand Trust".into()],
        };
        assert_eq!(fields.retain_known_categories(), 0);
        assert_eq!(
            fields.feature_categories,
            vec!["delivery speed".to_string(), "brand trust".to_string()]
        );
    }
}
