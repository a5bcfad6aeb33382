//! Embedding and chat-completion provider abstractions.
//!
//! Both traits are object-safe and dependency-injected so the backfill,
//! retrieval, and answer layers never know which vendor is behind them (and
//! tests can substitute failing or canned providers). Implementations:
//!
//! - **Disabled**: always errors; the configuration default.
//! - **Embedefy**: `POST /v1/embeddings` with `{model, inputs}` and a bearer
//!   token; an `error` field in the body is an explicit provider error, zero
//!   `inputs` in the body is an empty-result error.
//! - **OpenAI**: embeddings and chat completions with bounded timeout and
//!   exponential backoff on 429/5xx.
//!
//! Also provides the vector utilities shared by backfill and retrieval:
//! [`vec_to_blob`] / [`blob_to_vec`] (little-endian f32 BLOB encoding) and
//! [`cosine_similarity`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{ChatConfig, EmbeddingConfig};
use crate::error::ProviderError;

/// Fixed-length vector source for foods and queries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"e5-small-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// One few-shot message handed to the chat provider ahead of the real query.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: &'static str,
    pub content: String,
}

/// Text generator consuming a system prompt, few-shot turns, and the user
/// content. Only the first candidate's text is surfaced.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        examples: &[ChatTurn],
        user: &str,
    ) -> Result<String, ProviderError>;
}

pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "embedefy" => Ok(Box::new(EmbedefyProvider::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbeddings::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub fn create_chat_provider(config: &ChatConfig) -> Result<Box<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAiChat::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}

// ============ Disabled ============

/// Placeholder used when no provider is configured. Every call fails with a
/// descriptive message so `ask` and `embed` surface the misconfiguration
/// instead of silently returning nothing.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Transport(
            "embedding provider is disabled; set [embedding] provider in config".to_string(),
        ))
    }
}

#[async_trait]
impl ChatProvider for DisabledProvider {
    async fn complete(
        &self,
        _system: &str,
        _examples: &[ChatTurn],
        _user: &str,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Transport(
            "chat provider is disabled; set [chat] provider in config".to_string(),
        ))
    }
}

// ============ Embedefy ============

/// Embedding provider for the Embedefy API. Requires the
/// `EMBEDEFY_ACCESS_TOKEN` environment variable.
pub struct EmbedefyProvider {
    model: String,
    dims: usize,
    token: String,
    timeout: Duration,
}

impl EmbedefyProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Embedefy provider"))?;
        let token = std::env::var("EMBEDEFY_ACCESS_TOKEN")
            .map_err(|_| anyhow::anyhow!("EMBEDEFY_ACCESS_TOKEN environment variable not set"))?;

        Ok(Self {
            model,
            dims: config.dims,
            token,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for EmbedefyProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": self.model,
            "inputs": [text],
        });

        let response = client
            .post("https://api.embedefy.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response.json().await?;
        parse_embedefy_response(&json)
    }
}

/// The Embedefy body is `{inputs: [{data: [...]}]}` on success, or carries
/// `error`/`message` fields on failure.
fn parse_embedefy_response(json: &serde_json::Value) -> Result<Vec<f32>, ProviderError> {
    if let Some(code) = json.get("error").filter(|v| !v.is_null()) {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default();
        return Err(ProviderError::Api {
            code: code.as_str().map(str::to_string).unwrap_or_else(|| code.to_string()),
            message: message.to_string(),
        });
    }

    let inputs = json
        .get("inputs")
        .and_then(|i| i.as_array())
        .ok_or_else(|| ProviderError::Malformed("missing inputs array".to_string()))?;

    let first = inputs.first().ok_or(ProviderError::Empty)?;

    let data = first
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::Malformed("missing data array".to_string()))?;

    Ok(data
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ OpenAI embeddings ============

/// Embedding provider for the OpenAI `POST /v1/embeddings` endpoint, with
/// exponential-backoff retry on 429 and 5xx. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbeddings {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let json = post_openai_with_retry(
            "https://api.openai.com/v1/embeddings",
            &self.api_key,
            &body,
            self.max_retries,
            self.timeout,
        )
        .await?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing data array".to_string()))?;

        let first = data.first().ok_or(ProviderError::Empty)?;

        let embedding = first
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing embedding".to_string()))?;

        Ok(embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect())
    }
}

// ============ OpenAI chat ============

/// Chat-completion provider for `POST /v1/chat/completions`.
pub struct OpenAiChat {
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("chat.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(
        &self,
        system: &str,
        examples: &[ChatTurn],
        user: &str,
    ) -> Result<String, ProviderError> {
        let mut messages = vec![serde_json::json!({"role": "system", "content": system})];
        for turn in examples {
            messages.push(serde_json::json!({"role": turn.role, "content": turn.content}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let json = post_openai_with_retry(
            "https://api.openai.com/v1/chat/completions",
            &self.api_key,
            &body,
            0,
            self.timeout,
        )
        .await?;

        let choices = json
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing choices array".to_string()))?;

        let first = choices.first().ok_or(ProviderError::Empty)?;

        let content = first
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| ProviderError::Malformed("missing message content".to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// POST a JSON body to an OpenAI endpoint with retry/backoff.
///
/// - HTTP 429 or 5xx: retry with exponential backoff (1s, 2s, 4s, ... capped
///   at 2^5)
/// - other 4xx: fail immediately as an explicit provider error
/// - network error: retry
async fn post_openai_with_retry(
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    max_retries: u32,
    timeout: Duration,
) -> Result<serde_json::Value, ProviderError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(ProviderError::Transport(format!(
                        "HTTP {}: {}",
                        status, body_text
                    )));
                    continue;
                }

                // Other client errors are explicit, non-retryable failures
                return Err(ProviderError::Api {
                    code: status.as_u16().to_string(),
                    message: body_text,
                });
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| ProviderError::Transport("request failed after retries".to_string())))
}

// ============ Vector helpers ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`. Returns `0.0`
/// for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
