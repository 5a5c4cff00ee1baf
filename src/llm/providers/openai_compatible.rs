//! Chat-completions generator shared by OpenAI-compatible providers
//!
//! OpenAI, Qwen (DashScope compatible mode) and Azure OpenAI all speak the
//! chat-completions shape; only the endpoint, auth headers and a couple of
//! body extras differ, so those live in a small adapter per provider.

use crate::config::{GeneratorConfig, ProviderKind};
use crate::error::{LlmError, Result};
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{compose_messages, GenerationRequest, GenerationResponse, Generator, Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Chat-completions request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    /// DashScope extension, always `false` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    /// Repository access token, attached only when forwarding is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Wire message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for ApiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

/// Chat-completions response body
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ApiMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Per-provider endpoint and auth shape
pub trait ChatCompletionsApi: Send + Sync {
    /// Full URL of the chat-completions endpoint
    fn chat_url(&self, model: &str) -> String;

    /// Auth and provider-specific headers
    fn headers(&self) -> Vec<(&'static str, String)>;

    /// Whether the `enable_thinking: false` extension is sent
    fn disable_thinking(&self) -> bool {
        false
    }
}

/// Generator over any chat-completions adapter
pub struct ChatCompletionsGenerator<A: ChatCompletionsApi> {
    adapter: A,
    client: HttpProviderClient,
    config: GeneratorConfig,
}

impl<A: ChatCompletionsApi> ChatCompletionsGenerator<A> {
    pub fn new(adapter: A, config: GeneratorConfig) -> Self {
        let client = HttpProviderClient::new(config.timeout);
        Self {
            adapter,
            client,
            config,
        }
    }
}

#[async_trait]
impl<A: ChatCompletionsApi> Generator for ChatCompletionsGenerator<A> {
    fn provider(&self) -> ProviderKind {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            "Generating with {} using {} context items",
            self.config.provider,
            request.context.len()
        );

        let messages: Vec<ApiMessage> = compose_messages(request)
            .iter()
            .map(ApiMessage::from)
            .collect();

        let token = if self.config.forward_access_token {
            self.config.access_token.clone()
        } else {
            None
        };

        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            enable_thinking: self.adapter.disable_thinking().then_some(false),
            token,
        };

        let url = self.adapter.chat_url(&self.config.model);
        let headers = self.adapter.headers();

        let response: ChatCompletionResponse =
            self.client.post_json(&url, &body, &headers).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let tokens_used = response.usage.map(|u| u.total_tokens);
        let model = response.model.unwrap_or_else(|| self.config.model.clone());

        info!("Generated {} tokens with {}", tokens_used.unwrap_or(0), model);

        Ok(GenerationResponse {
            text: choice.message.content,
            tokens_used,
            model,
            finish_reason: choice.finish_reason,
        })
    }
}

// ============================================================================
// OpenAI
// ============================================================================

/// Plain OpenAI adapter
pub struct OpenAiAdapter {
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
        }
    }
}

impl ChatCompletionsApi for OpenAiAdapter {
    fn chat_url(&self, _model: &str) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = &self.api_key {
            headers.push(("Authorization", format!("Bearer {}", key)));
        }
        headers
    }
}

/// OpenAI generator
pub type OpenAiGenerator = ChatCompletionsGenerator<OpenAiAdapter>;

impl OpenAiGenerator {
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let adapter = OpenAiAdapter::new(config.base_url.clone(), config.api_key.clone());
        Arc::new(ChatCompletionsGenerator::new(adapter, config))
    }
}

// ============================================================================
// Qwen (DashScope compatible mode)
// ============================================================================

/// Qwen adapter
pub struct QwenAdapter {
    base_url: String,
    api_key: Option<String>,
    workspace_id: Option<String>,
}

impl QwenAdapter {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        workspace_id: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()),
            api_key,
            workspace_id,
        }
    }
}

impl ChatCompletionsApi for QwenAdapter {
    fn chat_url(&self, _model: &str) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = &self.api_key {
            headers.push(("Authorization", format!("Bearer {}", key)));
        }
        if let Some(workspace) = &self.workspace_id {
            headers.push(("X-DashScope-WorkSpace", workspace.clone()));
        }
        headers
    }

    fn disable_thinking(&self) -> bool {
        true
    }
}

/// Qwen generator
pub type QwenGenerator = ChatCompletionsGenerator<QwenAdapter>;

impl QwenGenerator {
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let adapter = QwenAdapter::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.workspace_id.clone(),
        );
        Arc::new(ChatCompletionsGenerator::new(adapter, config))
    }
}

// ============================================================================
// Azure OpenAI
// ============================================================================

const AZURE_API_VERSION: &str = "2023-12-01-preview";

/// Azure OpenAI adapter; the model doubles as the deployment name
pub struct AzureAdapter {
    base_url: String,
    api_key: Option<String>,
}

impl AzureAdapter {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self { base_url, api_key }
    }
}

impl ChatCompletionsApi for AzureAdapter {
    fn chat_url(&self, model: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url.trim_end_matches('/'),
            model,
            AZURE_API_VERSION
        )
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = &self.api_key {
            headers.push(("api-key", key.clone()));
        }
        headers
    }
}

/// Azure OpenAI generator
pub type AzureGenerator = ChatCompletionsGenerator<AzureAdapter>;

impl AzureGenerator {
    pub fn create(config: GeneratorConfig) -> Arc<dyn Generator> {
        let base_url = config.base_url.clone().unwrap_or_default();
        let adapter = AzureAdapter::new(base_url, config.api_key.clone());
        Arc::new(ChatCompletionsGenerator::new(adapter, config))
    }
}
