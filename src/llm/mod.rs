//! Generator abstraction over language-model providers

pub mod providers;

use crate::config::ProviderKind;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fixed system preamble prepended to every generation request.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant that answers questions based on the provided context. Always cite specific files and code sections when relevant.";

/// Canonical separator between context items.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A single generation request: the question plus retrieved context
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: Vec::new(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Response from text generation
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Trait implemented by every generator provider
#[async_trait]
pub trait Generator: Send + Sync {
    /// Get the provider variant
    fn provider(&self) -> ProviderKind;

    /// Get the model identifier
    fn model(&self) -> &str;

    /// Generate text for a request
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Test if the provider is reachable
    async fn test_connection(&self) -> Result<bool> {
        let probe = GenerationRequest {
            prompt: "ping".to_string(),
            context: Vec::new(),
            temperature: 0.0,
            max_tokens: 1,
        };
        match self.generate(&probe).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Estimate the token count of a text
    fn estimate_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Default token estimator: four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Join the request context and question into the user-turn content.
pub fn compose_user_content(request: &GenerationRequest) -> String {
    if request.context.is_empty() {
        request.prompt.clone()
    } else {
        format!(
            "Context:\n\n{}\n\n{}",
            request.context.join(CONTEXT_SEPARATOR),
            request.prompt
        )
    }
}

/// Build the canonical two-message conversation for chat-shaped providers.
pub fn compose_messages(request: &GenerationRequest) -> Vec<Message> {
    vec![
        system_message(SYSTEM_PREAMBLE),
        user_message(compose_user_content(request)),
    ]
}

/// Remove a fenced markdown wrapper around a whole answer, if present.
///
/// The answer itself must be markdown, never a ```markdown code block
/// containing markdown.
pub fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    for opener in ["```markdown\n", "```md\n", "```\n"] {
        if let Some(rest) = trimmed.strip_prefix(opener) {
            if let Some(inner) = rest.strip_suffix("```") {
                return inner.trim_end().to_string();
            }
        }
    }
    text.to_string()
}

/// Helper function to create a system message
pub fn system_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::System,
        content: content.into(),
    }
}

/// Helper function to create a user message
pub fn user_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::User,
        content: content.into(),
    }
}

/// Helper function to create an assistant message
pub fn assistant_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::Assistant,
        content: content.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let system_msg = system_message("You are a helpful assistant");
        assert_eq!(system_msg.role, Role::System);

        let user_msg = user_message("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.content, "Hello");
    }

    #[test]
    fn test_role_lowercase_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_compose_user_content_joins_context() {
        let mut request = GenerationRequest::new("What does this do?");
        assert_eq!(compose_user_content(&request), "What does this do?");

        request.context = vec!["first".to_string(), "second".to_string()];
        let content = compose_user_content(&request);
        assert!(content.contains("first\n\n---\n\nsecond"));
        assert!(content.ends_with("What does this do?"));
    }

    #[test]
    fn test_compose_messages_has_preamble() {
        let request = GenerationRequest::new("q");
        let messages = compose_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PREAMBLE);
    }

    #[test]
    fn test_strip_markdown_fence() {
        let wrapped = "```markdown\n# Title\n\nbody\n```";
        assert_eq!(strip_markdown_fence(wrapped), "# Title\n\nbody");

        let plain = "# Title\n\nbody";
        assert_eq!(strip_markdown_fence(plain), plain);

        let inner_fence = "text\n```rust\nfn main() {}\n```\nmore";
        assert_eq!(strip_markdown_fence(inner_fence), inner_fence);
    }
}
