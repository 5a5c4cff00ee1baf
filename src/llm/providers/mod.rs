//! Generator provider implementations
//!
//! Concrete implementations for the supported language-model providers.

pub mod anthropic;
pub mod base;
pub mod google;
pub mod ollama;
pub mod openai_compatible;

// Re-export commonly used types
pub use anthropic::AnthropicGenerator;
pub use base::HttpProviderClient;
pub use google::GoogleGenerator;
pub use ollama::OllamaGenerator;
pub use openai_compatible::{
    AzureGenerator, ChatCompletionsApi, ChatCompletionsGenerator, OpenAiGenerator, QwenGenerator,
};
