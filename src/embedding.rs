//! Embedding provider abstraction and implementations.
//!
//! The phrase clusterer needs one fixed-length vector per distinct phrase,
//! order-preserving. Backends:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not
//!   configured. The clusterer's short-circuit path never touches it.
//! - **[`OllamaEmbedder`]** — calls a local Ollama `/api/embed` endpoint.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API.
//!
//! Both remote backends batch their inputs and retry transient failures with
//! exponential backoff: HTTP 429 and 5xx retry, other 4xx fail immediately,
//! network errors retry. Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5).

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Batch embedding boundary consumed by the clusterer.
///
/// Implementations must return exactly one vector per input text, in input
/// order, with a fixed dimensionality for a given model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Instantiate the embedder named by the configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// A no-op embedder that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

/// Embedder backed by a local Ollama instance (`POST /api/embed`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.base_url.trim_end_matches('/'));
        let url = &url;

        let vectors = embed_in_batches(texts, self.config.batch_size, |chunk| async move {
            let body = serde_json::json!({
                "model": self.model,
                "input": chunk,
            });

            let json =
                post_with_retry(&self.client, url, None, &body, self.config.max_retries).await?;

            let data = json
                .get("embeddings")
                .and_then(|d| d.as_array())
                .ok_or_else(|| {
                    anyhow::anyhow!("Invalid Ollama response: missing embeddings array")
                })?;

            parse_vectors(data)
        })
        .await?;

        check_batch_shape(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

/// Embedder backed by the OpenAI `/v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let api_key = &api_key;

        let vectors = embed_in_batches(texts, self.config.batch_size, |chunk| async move {
            let body = serde_json::json!({
                "model": self.model,
                "input": chunk,
            });

            let json = post_with_retry(
                &self.client,
                "https://api.openai.com/v1/embeddings",
                Some(api_key.as_str()),
                &body,
                self.config.max_retries,
            )
            .await?;

            let data = json
                .get("data")
                .and_then(|d| d.as_array())
                .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

            let mut vectors = Vec::with_capacity(data.len());
            for item in data {
                let embedding = item
                    .get("embedding")
                    .and_then(|e| e.as_array())
                    .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
                vectors.push(parse_vector(embedding));
            }
            Ok(vectors)
        })
        .await?;

        check_batch_shape(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

/// Split a batch into `batch_size` chunks, issue one request per chunk, and
/// concatenate the resulting vectors in input order.
///
/// Requests run sequentially; a failed chunk aborts the whole batch.
async fn embed_in_batches<F, Fut>(
    texts: &[String],
    batch_size: usize,
    mut request: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        vectors.extend(request(chunk.to_vec()).await?);
    }
    Ok(vectors)
}

/// POST a JSON body with bounded exponential-backoff retry.
///
/// Retry strategy:
/// - HTTP 429 or 5xx → retry with backoff
/// - HTTP 4xx (not 429) → fail immediately
/// - Network error → retry
pub(crate) async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}

fn parse_vector(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

fn parse_vectors(data: &[serde_json::Value]) -> Result<Vec<Vec<f32>>> {
    data.iter()
        .map(|item| {
            let arr = item
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: non-array vector"))?;
            Ok(parse_vector(arr))
        })
        .collect()
}

fn check_batch_shape(vectors: &[Vec<f32>], expected_len: usize, dims: usize) -> Result<()> {
    if vectors.len() != expected_len {
        bail!(
            "Embedding count mismatch: sent {} texts, got {} vectors",
            expected_len,
            vectors.len()
        );
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        bail!(
            "Embedding dims mismatch: expected {}, got {}",
            dims,
            bad.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_embedder_has_no_dims() {
        let e = DisabledEmbedder;
        assert_eq!(e.model_name(), "disabled");
        assert_eq!(e.dims(), 0);
    }

    #[tokio::test]
    async fn disabled_embedder_errors_on_use() {
        let e = DisabledEmbedder;
        let err = e.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn batches_are_chunked_and_concatenated_in_order() {
        let texts: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        let mut chunk_sizes = Vec::new();

        let out = embed_in_batches(&texts, 2, |chunk| {
            chunk_sizes.push(chunk.len());
            async move {
                Ok(chunk
                    .iter()
                    .map(|t| vec![t.parse::<f32>().unwrap()])
                    .collect())
            }
        })
        .await
        .unwrap();

        assert_eq!(chunk_sizes, vec![2, 2, 1]);
        let flattened: Vec<f32> = out.into_iter().map(|v| v[0]).collect();
        assert_eq!(flattened, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn failed_chunk_aborts_the_batch() {
        let texts: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        let mut calls = 0usize;

        let result = embed_in_batches(&texts, 2, |_chunk| {
            calls += 1;
            let fail = calls > 1;
            async move {
                if fail {
                    bail!("second chunk rejected")
                }
                Ok(vec![vec![0.0], vec![0.0]])
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn batch_shape_mismatches_are_rejected() {
        let vectors = vec![vec![0.0f32; 4], vec![0.0f32; 4]];
        assert!(check_batch_shape(&vectors, 2, 4).is_ok());
        assert!(check_batch_shape(&vectors, 3, 4).is_err());
        assert!(check_batch_shape(&vectors, 2, 8).is_err());
    }
}
