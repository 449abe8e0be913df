//! Question embedding.
//!
//! The retriever and the ingestion commands only see [`EmbeddingProvider`].
//! [`OpenAIProvider`] talks to an OpenAI-compatible `/embeddings` endpoint,
//! either OpenAI itself or a gateway set through `AI_GATEWAY_URL`.
//! [`DisabledProvider`] stands in when `embedding.provider = "disabled"`.
//!
//! Transient failures (network errors, `429`, `5xx`) are retried up to
//! `embedding.max_retries` times with a doubling delay starting at one
//! second and capped at 32 seconds. Any other non-success status fails at
//! once as an upstream error.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "embedding";

/// Converts text into fixed-length vectors.
///
/// Implementations are built once at start-up and shared across requests,
/// so they must be `Send + Sync`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier sent with every request.
    fn model_name(&self) -> &str;
    /// Length of every vector this provider returns.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed one question.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| Error::upstream(SERVICE, "empty embedding response"))
}

/// Fails every call, so a KB lookup surfaces as an upstream error.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::upstream(SERVICE, "embedding provider is disabled"))
    }
}

/// Embedding provider using an OpenAI-compatible API.
///
/// Calls `POST {url}/embeddings` with the configured model. The HTTP client
/// is created once and reused for every call.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIProvider {
    /// Create a new provider from configuration and an API key.
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build embedding client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/embeddings", self.url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::upstream(SERVICE, e))?;
                        let vectors = parse_openai_response(&json)?;
                        if vectors.len() != texts.len() {
                            return Err(Error::upstream(
                                SERVICE,
                                format!(
                                    "expected {} embeddings, got {}",
                                    texts.len(),
                                    vectors.len()
                                ),
                            ));
                        }
                        return Ok(vectors);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::upstream(
                            SERVICE,
                            format!("API error {}: {}", status, body_text),
                        ));
                        continue;
                    }

                    // Client error (not 429), no retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::upstream(
                        SERVICE,
                        format!("API error {}: {}", status, body_text),
                    ));
                }
                Err(e) => {
                    last_err = Some(Error::upstream(SERVICE, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::upstream(SERVICE, "failed after retries")))
    }
}

/// Parse the embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::upstream(SERVICE, "invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::upstream(SERVICE, "invalid response: missing embedding"))?;

        let vec = embedding
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    Error::upstream(SERVICE, "invalid response: non-numeric embedding value")
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Build the provider named by `embedding.provider`. `openai` needs a key.
pub fn create_provider(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => {
            let key = api_key.ok_or_else(|| {
                Error::Config("OPENAI_API_KEY environment variable not set".to_string())
            })?;
            Ok(Box::new(OpenAIProvider::new(config, key.to_string())?))
        }
        other => Err(Error::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Cosine of the angle between `a` and `b`; `0.0` for mismatched or
/// zero-length inputs.
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
