use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_extract_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: default_ollama_url(),
            timeout_secs: default_extract_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            base_url: default_ollama_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    /// Target cluster count per phrase field; capped at the distinct phrase
    /// count at clustering time.
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    /// How many ranked representatives each summary field keeps.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cluster_count: default_cluster_count(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Upper bound on pending reviews fetched per run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_extract_timeout_secs() -> u64 {
    120
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_batch_size() -> usize {
    64
}
fn default_cluster_count() -> usize {
    10
}
fn default_top_k() -> usize {
    5
}
fn default_batch_limit() -> usize {
    50
}

impl ExtractorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate clustering
    if config.clustering.cluster_count == 0 {
        anyhow::bail!("clustering.cluster_count must be > 0");
    }
    if config.clustering.top_k == 0 {
        anyhow::bail!("clustering.top_k must be > 0");
    }

    if config.pipeline.batch_limit == 0 {
        anyhow::bail!("pipeline.batch_limit must be > 0");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate extractor
    match config.extractor.provider.as_str() {
        "disabled" => {}
        "ollama" | "openai" => {
            if config.extractor.model.is_none() {
                anyhow::bail!(
                    "extractor.model must be specified when provider is '{}'",
                    config.extractor.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown extractor provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" => {}
        "ollama" | "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    Ok(config)
}
