//! Ollama local provider implementation

use crate::config::{GeneratorConfig, ProviderKind};
use crate::error::Result;
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{
    compose_user_content, GenerationRequest, GenerationResponse, Generator, SYSTEM_PREAMBLE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Ollama API request for generation
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Ollama API response for generation
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelInfo>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelInfo {
    #[allow(dead_code)]
    name: String,
}

/// Ollama generator for locally hosted models
pub struct OllamaGenerator {
    client: HttpProviderClient,
    config: GeneratorConfig,
}

impl OllamaGenerator {
    /// Create a new Ollama generator
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let client = HttpProviderClient::new(config.timeout);
        Arc::new(Self { client, config })
    }

    /// Get the base URL for API calls
    fn api_url(&self, endpoint: &str) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("http://localhost:11434");
        format!("{}/api/{}", base.trim_end_matches('/'), endpoint)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            "Generating with Ollama using {} context items",
            request.context.len()
        );

        // The generate endpoint takes a single prompt string, so the preamble
        // leads the composed content.
        let prompt = format!("{}\n\n{}", SYSTEM_PREAMBLE, compose_user_content(request));

        let body = OllamaGenerateRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
        };

        let url = self.api_url("generate");
        let response: OllamaGenerateResponse = self.client.post_json(&url, &body, &[]).await?;

        info!(
            "Generated {} tokens with {}",
            response.eval_count.unwrap_or(0),
            response.model.as_deref().unwrap_or(&self.config.model)
        );

        Ok(GenerationResponse {
            text: response.response,
            tokens_used: response.eval_count,
            model: response.model.unwrap_or_else(|| self.config.model.clone()),
            finish_reason: response.done_reason,
        })
    }

    async fn test_connection(&self) -> Result<bool> {
        let url = self.api_url("tags");
        match self.client.get::<OllamaTagsResponse>(&url, &[]).await {
            Ok(tags) => {
                debug!("Ollama reachable with {} models", tags.models.len());
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}
