//! Maps validated configuration to concrete generator and embedder variants

use crate::config::{EmbedderKind, ProviderKind, WikiConfig};
use crate::embedding::{Embedder, RemoteEmbedder, TfIdfEmbedder};
use crate::error::Result;
use crate::llm::providers::{
    AnthropicGenerator, AzureGenerator, GoogleGenerator, OllamaGenerator, OpenAiGenerator,
    QwenGenerator,
};
use crate::llm::Generator;
use std::sync::Arc;
use tracing::{debug, info};

/// Construction-time dispatch from configuration to provider variants
pub struct ProviderRouter;

impl ProviderRouter {
    /// Build the configured generator; configuration is validated first
    pub fn generator(config: &WikiConfig) -> Result<Arc<dyn Generator>> {
        config.validate()?;

        let provider = config.provider.clone();
        debug!("Routing generator to {}", provider.provider);

        Ok(match provider.provider {
            ProviderKind::OpenAI => OpenAiGenerator::create(provider),
            ProviderKind::Anthropic => AnthropicGenerator::create(provider),
            ProviderKind::Qwen => QwenGenerator::create(provider),
            ProviderKind::Google => GoogleGenerator::create(provider),
            ProviderKind::Ollama => OllamaGenerator::create(provider),
            ProviderKind::Azure => AzureGenerator::create(provider),
        })
    }

    /// Build the configured embedder; configuration is validated first
    pub fn embedder(config: &WikiConfig) -> Result<Arc<dyn Embedder>> {
        config.validate()?;

        debug!("Routing embedder to {:?}", config.embedder.provider);

        Ok(match config.embedder.provider {
            EmbedderKind::Local => Arc::new(TfIdfEmbedder::new(
                config.embedder.dimensions,
                config.embedder.local.clone(),
            )),
            EmbedderKind::OpenAI => Arc::new(RemoteEmbedder::new(
                config.embedder.clone(),
                config.provider.timeout,
            )),
        })
    }

    /// Single connectivity-test operation for the configured generator
    pub async fn test_connection(config: &WikiConfig) -> Result<bool> {
        let generator = Self::generator(config)?;
        let reachable = generator.test_connection().await?;
        info!(
            "Connectivity test for {}: {}",
            config.provider.provider,
            if reachable { "ok" } else { "unreachable" }
        );
        Ok(reachable)
    }
}
