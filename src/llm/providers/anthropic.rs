//! Anthropic Claude provider implementation
//!
//! Anthropic uses a different message format than the chat-completions
//! providers, so the Generator trait is implemented directly: the system
//! preamble travels in a top-level `system` field and auth uses `x-api-key`.

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

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Anthropic API request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<AnthropicMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Anthropic API response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<ContentBlock>,
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anthropic Claude generator
pub struct AnthropicGenerator {
    client: HttpProviderClient,
    config: GeneratorConfig,
}

impl AnthropicGenerator {
    /// Create a new Anthropic generator
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let client = HttpProviderClient::new(config.timeout);
        Arc::new(Self { client, config })
    }

    fn base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com".to_string())
    }

    fn build_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("anthropic-version", ANTHROPIC_VERSION.to_string())];
        if let Some(api_key) = &self.config.api_key {
            headers.push(("x-api-key", api_key.clone()));
        }
        headers
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            "Generating with Anthropic using {} context items",
            request.context.len()
        );

        let body = AnthropicRequest {
            model: self.config.model.clone(),
            system: SYSTEM_PREAMBLE.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: compose_user_content(request),
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/messages", self.base_url().trim_end_matches('/'));
        let headers = self.build_headers();

        let response: AnthropicResponse = self.client.post_json(&url, &body, &headers).await?;

        let text = response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| LlmError::InvalidResponse("No content in response".to_string()))?;

        let tokens_used = response
            .usage
            .map(|u| u.input_tokens + u.output_tokens);

        info!(
            "Generated {} tokens with {}",
            tokens_used.unwrap_or(0),
            response.model
        );

        Ok(GenerationResponse {
            text,
            tokens_used,
            model: response.model,
            finish_reason: response.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GeneratorConfig {
        GeneratorConfig {
            provider: ProviderKind::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: Some("test-key".to_string()),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_generator_creation() {
        let generator = AnthropicGenerator::create(test_config());
        assert_eq!(generator.provider(), ProviderKind::Anthropic);
        assert_eq!(generator.model(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_headers_carry_version_and_key() {
        let config = test_config();
        let client = HttpProviderClient::new(config.timeout);
        let generator = AnthropicGenerator { client, config };

        let headers = generator.build_headers();
        assert!(headers
            .iter()
            .any(|(k, v)| *k == "anthropic-version" && v == ANTHROPIC_VERSION));
        assert!(headers.iter().any(|(k, v)| *k == "x-api-key" && v == "test-key"));
    }

    #[test]
    fn test_request_shape() {
        let body = AnthropicRequest {
            model: "claude".to_string(),
            system: SYSTEM_PREAMBLE.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: 0.7,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["system"].as_str().unwrap().starts_with("You are a helpful"));
    }
}
