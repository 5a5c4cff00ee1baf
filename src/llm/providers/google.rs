//! Google Gemini provider implementation

use crate::config::{GeneratorConfig, ProviderKind};
use crate::error::{LlmError, Result};
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{
    compose_user_content, GenerationRequest, GenerationResponse, Generator, SYSTEM_PREAMBLE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Gemini request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Gemini response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: GeminiContent,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    #[serde(default)]
    pub total_token_count: u32,
}

/// Google Gemini generator
pub struct GoogleGenerator {
    client: HttpProviderClient,
    config: GeneratorConfig,
}

impl GoogleGenerator {
    /// Create a new Google Gemini generator
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let client = HttpProviderClient::new(config.timeout);
        Arc::new(Self { client, config })
    }

    fn base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url().trim_end_matches('/'),
            self.config.model,
            self.config.api_key.as_deref().unwrap_or_default()
        )
    }
}

#[async_trait]
impl Generator for GoogleGenerator {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            "Generating with Gemini using {} context items",
            request.context.len()
        );

        // Gemini has no system channel in this shape; the preamble leads the
        // single user part.
        let text = format!("{}\n\n{}", SYSTEM_PREAMBLE, compose_user_content(request));

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let url = self.generate_url();
        let response: GeminiResponse = self.client.post_json(&url, &body, &[]).await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No candidates in response".to_string()))?;

        let text = candidate
            .content
            .parts
            .first()
            .map(|part| part.text.clone())
            .ok_or_else(|| LlmError::InvalidResponse("No parts in candidate".to_string()))?;

        let tokens_used = response.usage_metadata.map(|u| u.total_token_count);

        info!(
            "Generated {} tokens with {}",
            tokens_used.unwrap_or(0),
            self.config.model
        );

        Ok(GenerationResponse {
            text,
            tokens_used,
            model: self.config.model.clone(),
            finish_reason: candidate.finish_reason,
        })
    }
}
