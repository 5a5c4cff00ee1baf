//! Remote embedder over the OpenAI embeddings contract

use crate::config::EmbedderConfig;
use crate::embedding::{Embedder, EmbedderFingerprint};
use crate::error::{body_excerpt, LlmError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Embeddings API request
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

/// A single text or a batch, per the endpoint contract
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

/// Embeddings API response
#[derive(Debug, Deserialize)]
struct EmbeddingResponseData {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote HTTP embedder
pub struct RemoteEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
    timeout: Duration,
}

impl RemoteEmbedder {
    /// Create a new remote embedder
    pub fn new(config: EmbedderConfig, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn embeddings_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        format!("{}/embeddings", base.trim_end_matches('/'))
    }

    async fn request(&self, input: EmbeddingInput<'_>) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input,
        };

        let url = self.embeddings_url();
        debug!("Making embedding request to: {}", url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {} error", status));
            error!("Embedding API error ({})", status);
            debug!("Embedding error body: {}", error_text);
            return Err(LlmError::EmbeddingFailed {
                status: status.as_u16(),
                excerpt: body_excerpt(&error_text),
            }
            .into());
        }

        let parsed: EmbeddingResponseData = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn fingerprint(&self) -> EmbedderFingerprint {
        EmbedderFingerprint {
            provider: "openai".to_string(),
            model: self.config.model.clone(),
            dimensions: self.config.dimensions,
        }
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(EmbeddingInput::Single(text)).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("No embedding in response".to_string()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.request(EmbeddingInput::Batch(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }

        info!("Embedded batch of {} texts", texts.len());
        Ok(vectors)
    }
}
