//! Embedding providers.
//!
//! Concrete implementations of [`Embedder`]:
//! - **[`bedrock::BedrockEmbedder`]**: Amazon Titan text embeddings via Bedrock `InvokeModel`, SigV4-signed.
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//! - **[`HashingEmbedder`]**: bag-of-words feature hashing, offline and deterministic.
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are off.
//!
//! Providers make exactly one request per call. Retrying is opt-in through
//! [`RetryingEmbedder`], which [`create_embedder`] adds when
//! `embedding.max_retries > 0`.
//!
//! # Retry Strategy
//!
//! - Network errors, HTTP 429, and 5xx → retry
//! - Any other 4xx or a malformed body → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

pub mod bedrock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use session_memory_core::embedding::hashing::HashingEmbedder;
use session_memory_core::embedding::Embedder;
use session_memory_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;

/// Build the provider named by `config.provider`.
///
/// ```rust,no_run
/// # use session_memory::config::EmbeddingConfig;
/// # use session_memory::embedding::create_embedder;
/// let config = EmbeddingConfig {
///     provider: "disabled".into(),
///     ..EmbeddingConfig::default()
/// };
/// let embedder = create_embedder(&config).unwrap();
/// assert_eq!(embedder.model_name(), "disabled");
/// ```
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    let provider: Arc<dyn Embedder> = match config.provider.as_str() {
        "bedrock" => Arc::new(bedrock::BedrockEmbedder::new(config)?),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        "hashing" => Arc::new(HashingEmbedder::new(config.dims)),
        "disabled" => Arc::new(DisabledEmbedder {
            dims: config.dims,
        }),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    };

    if config.max_retries > 0 {
        Ok(Arc::new(RetryingEmbedder::new(provider, config.max_retries)))
    } else {
        Ok(provider)
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and decode a JSON body, sorting failures into transport,
/// service, and malformed-response errors.
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, EmbeddingError> {
    let response = request
        .send()
        .await
        .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Service {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))
}

/// Read a JSON array of numbers as a vector.
pub(crate) fn json_vector(value: Option<&Value>, what: &str) -> Result<Vec<f32>, EmbeddingError> {
    let array = value
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::MalformedResponse(format!("missing {what}")))?;

    array
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                EmbeddingError::MalformedResponse(format!("non-numeric value in {what}"))
            })
        })
        .collect()
}

// ============ Disabled Provider ============

/// Fails every call with [`EmbeddingError::Disabled`].
pub struct DisabledEmbedder {
    pub dims: usize,
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI Provider ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// [`EmbeddingError::Config`] if `OPENAI_API_KEY` is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EmbeddingError::Config("OPENAI_API_KEY environment variable not set".into())
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let request = self
            .client
            .post(format!("{}/v1/embeddings", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body);

        parse_openai_response(&send_json(request).await?)
    }
}

/// Extract `data[0].embedding`.
fn parse_openai_response(json: &Value) -> Result<Vec<f32>, EmbeddingError> {
    let first = json
        .get("data")
        .and_then(Value::as_array)
        .and_then(|d| d.first())
        .ok_or_else(|| EmbeddingError::MalformedResponse("missing data array".into()))?;
    json_vector(first.get("embedding"), "data[0].embedding")
}

// ============ Ollama Provider ============

/// Calls `POST /api/embed` on the configured Ollama URL (default
/// `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config.model.clone(),
            dims: config.dims,
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

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let request = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body);

        let json = send_json(request).await.map_err(|e| match e {
            EmbeddingError::Transport(msg) => EmbeddingError::Transport(format!(
                "Ollama connection error (is Ollama running at {}?): {}",
                self.url, msg
            )),
            other => other,
        })?;
        parse_ollama_response(&json)
    }
}

/// Extract `embeddings[0]`.
fn parse_ollama_response(json: &Value) -> Result<Vec<f32>, EmbeddingError> {
    let first = json
        .get("embeddings")
        .and_then(Value::as_array)
        .and_then(|e| e.first());
    json_vector(first, "embeddings[0]")
}

// ============ Retry Layer ============

/// Retries transient failures of an inner provider with exponential backoff.
pub struct RetryingEmbedder {
    inner: Arc<dyn Embedder>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Replace the first backoff step (1s by default).
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

#[async_trait]
impl Embedder for RetryingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.inner.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "embedding failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
