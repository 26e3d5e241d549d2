//! Opinion extraction boundary.
//!
//! One contract for all LLM use: a review comment goes in, structured
//! [`AnalysisFields`] come out, or the call fails and the review stays
//! pending. Calls are slow and billed, so the orchestrator invokes this at
//! most once per review per run; retries here cover only transport-level
//! failures, never re-prompting.
//!
//! Backends follow the provider pattern used for embeddings:
//! - **[`OllamaExtractor`]** — local Ollama `/api/generate` with JSON output
//!   mode and temperature 0.
//! - **[`OpenAiExtractor`]** — OpenAI chat completions with a JSON response
//!   format. Requires `OPENAI_API_KEY`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ExtractorConfig;
use crate::embedding::post_with_retry;
use crate::models::{AnalysisFields, FEATURE_CATEGORIES};

/// Single-operation contract of the opinion extractor.
#[async_trait]
pub trait OpinionExtractor: Send + Sync {
    /// Model identifier, for run reports.
    fn model_name(&self) -> &str;
    /// Analyze one review comment. Fallible; a failure leaves the review
    /// pending for a later run.
    async fn extract(&self, review_text: &str) -> Result<AnalysisFields>;
}

/// Instantiate the extractor named by the configuration.
pub fn create_extractor(config: &ExtractorConfig) -> Result<Box<dyn OpinionExtractor>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaExtractor::new(config)?)),
        "openai" => Ok(Box::new(OpenAiExtractor::new(config)?)),
        "disabled" => bail!("Extractor provider is disabled. Set [extractor] provider in config."),
        other => bail!("Unknown extractor provider: {}", other),
    }
}

/// Build the analyst prompt for one review, with the closed feature-category
/// vocabulary inlined as context.
fn build_prompt(review_text: &str) -> String {
    let vocabulary = FEATURE_CATEGORIES.join(", ");
    format!(
        "You are a product review analyst AI. Analyze the following customer review.\n\
         Provide the output in English only, regardless of the review's original language.\n\
         \n\
         Return one JSON object with exactly these fields:\n\
         1. sentiment: \"positive\", \"neutral\", or \"negative\"\n\
         2. sentiment_confidence: a number between 0 and 1 indicating how confident the sentiment classification is\n\
         3. pros: positive aspects of the product, max 5 words per tag\n\
         4. cons: negative aspects of the product (not suggestions or complaints), max 5 words per tag\n\
         5. complaints: specific problems the producer should improve\n\
         6. suggestions: contextual advice for potential customers\n\
         7. expectations: features the user expected but the product did not provide\n\
         8. feature_categories: relevant product aspects, chosen ONLY from this list: {vocabulary}\n\
         \n\
         Customer review:\n\
         {review_text}\n\
         \n\
         Do not include any text before or after the JSON object. Only return the JSON."
    )
}

/// Parse a model's JSON reply into [`AnalysisFields`].
///
/// Tolerates replies wrapped in markdown code fences, which smaller local
/// models emit even when told not to.
fn parse_reply(reply: &str) -> Result<AnalysisFields> {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    serde_json::from_str(trimmed).with_context(|| "Extractor returned invalid structure")
}

/// Extractor backed by a local Ollama instance.
pub struct OllamaExtractor {
    model: String,
    config: ExtractorConfig,
    client: reqwest::Client,
}

impl OllamaExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("extractor.model required for Ollama provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl OpinionExtractor for OllamaExtractor {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, review_text: &str) -> Result<AnalysisFields> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(review_text),
            "stream": false,
            "format": "json",
            "options": { "temperature": 0 },
        });

        let json = post_with_retry(&self.client, &url, None, &body, self.config.max_retries).await?;

        let reply = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))?;

        parse_reply(reply)
    }
}

/// Extractor backed by the OpenAI chat completions API.
pub struct OpenAiExtractor {
    model: String,
    config: ExtractorConfig,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("extractor.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl OpinionExtractor for OpenAiExtractor {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, review_text: &str) -> Result<AnalysisFields> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "user", "content": build_prompt(review_text) }
            ],
        });

        let json = post_with_retry(
            &self.client,
            "https://api.openai.com/v1/chat/completions",
            Some(&api_key),
            &body,
            self.config.max_retries,
        )
        .await?;

        let reply = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

        parse_reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sentiment;

    const REPLY: &str = r#"{
        "sentiment": "positive",
        "sentiment_confidence": 0.92,
        "pros": ["great fabric quality"],
        "cons": [],
        "complaints": [],
        "suggestions": ["size runs small"],
        "expectations": [],
        "feature_categories": ["material quality"]
    }"#;

    #[test]
    fn parses_plain_json_reply() {
        let fields = parse_reply(REPLY).unwrap();
        assert_eq!(fields.sentiment, Sentiment::Positive);
        assert_eq!(fields.sentiment_confidence, Some(0.92));
        assert_eq!(fields.pros, vec!["great fabric quality".to_string()]);
    }

    #[test]
    fn parses_fenced_json_reply() {
        let fenced = format!("```json\n{}\n```", REPLY);
        let fields = parse_reply(&fenced).unwrap();
        assert_eq!(fields.sentiment, Sentiment::Positive);
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let fields = parse_reply(r#"{"sentiment": "neutral"}"#).unwrap();
        assert_eq!(fields.sentiment, Sentiment::Neutral);
        assert!(fields.sentiment_confidence.is_none());
        assert!(fields.pros.is_empty());
    }

    #[test]
    fn invalid_structure_is_an_error() {
        assert!(parse_reply("the product was nice").is_err());
        assert!(parse_reply(r#"{"sentiment": "ecstatic"}"#).is_err());
    }

    #[test]
    fn prompt_carries_the_full_vocabulary() {
        let prompt = build_prompt("harika bir ürün");
        for category in FEATURE_CATEGORIES {
            assert!(prompt.contains(category));
        }
        assert!(prompt.contains("harika bir ürün"));
    }
}
