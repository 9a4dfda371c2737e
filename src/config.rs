//! Configuration for `smem`.
//!
//! Loaded from a TOML file (default `./config/smem.toml`). Every section is
//! optional; a missing file yields the defaults. Selected values can be
//! overridden from the environment after the file is read.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "./config/smem.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `sqlite` or `chroma`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite database file.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Chroma server base URL.
    #[serde(default = "default_chroma_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_index_path(),
            url: default_chroma_url(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/memory.sqlite")
}
fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_collection() -> String {
    "work_sessions".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `bedrock`, `ollama`, `openai`, `hashing` (offline), or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// AWS region for Bedrock.
    #[serde(default = "default_region")]
    pub region: String,
    /// Base URL override (Ollama server, OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure. Zero disables retrying.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            region: default_region(),
            url: None,
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_provider() -> String {
    "bedrock".to_string()
}
fn default_model() -> String {
    "amazon.titan-embed-text-v2:0".to_string()
}
fn default_region() -> String {
    "us-east-2".to_string()
}
fn default_dims() -> usize {
    1024
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Upper bound on in-flight embedding calls during batch ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            journal_dir: default_journal_dir(),
            include_globs: default_include_globs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("./journals")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.md".to_string()]
}
fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_example_limit")]
    pub example_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            example_limit: default_example_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_example_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Read, override, and validate the config at `path`.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        debug!("no config file at {}, using defaults", path.display());
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

impl Config {
    /// Apply `SMEM_*` and `AWS_REGION` overrides. `lookup` is the variable
    /// source, normally `std::env::var`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("SMEM_INDEX_PATH") {
            self.index.path = PathBuf::from(val);
        }
        if let Some(val) = lookup("SMEM_CHROMA_URL") {
            self.index.url = val;
        }
        if let Some(val) = lookup("SMEM_JOURNAL_PATH") {
            self.ingest.journal_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("AWS_REGION") {
            self.embedding.region = val;
        }
        if let Some(val) = lookup("SMEM_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Some(val) = lookup("SMEM_LOG") {
            self.logging.level = val;
        }
    }
}

pub fn validate(config: &Config) -> Result<()> {
    match config.index.backend.as_str() {
        "sqlite" | "chroma" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be sqlite or chroma.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "bedrock" | "ollama" | "openai" | "hashing" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be bedrock, ollama, openai, hashing, or disabled.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.trim().is_empty() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.ingest.concurrency == 0 {
        anyhow::bail!("ingest.concurrency must be >= 1");
    }

    if config.retrieval.default_limit == 0 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }

    Ok(())
}
