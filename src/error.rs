//! Error handling for the wiki + RAG engine

use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, WikiError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum WikiError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors related to language model operations (generation and embedding)
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Generation failed (HTTP {status}): {excerpt}")]
    GenerationFailed { status: u16, excerpt: String },

    #[error("Embedding failed (HTTP {status}): {excerpt}")]
    EmbeddingFailed { status: u16, excerpt: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout: operation took too long")]
    Timeout,
}

/// Errors related to indexing and the vector store
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedder not trained: call train() before embed()")]
    NotTrained,

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Oversized logical unit in {0}: exceeds the token budget")]
    OversizedChunk(String),

    #[error("Storage failed: {0}")]
    StorageFailed(String),
}

/// Truncate a provider response body to a loggable excerpt.
///
/// The full body is only emitted at debug level by the HTTP layer; surfaced
/// errors carry this excerpt and never the caller's credentials.
pub fn body_excerpt(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl WikiError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WikiError::Llm(LlmError::Timeout)
                | WikiError::Llm(LlmError::ConnectionFailed(_))
                | WikiError::Http(_)
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            WikiError::Llm(_) => "llm",
            WikiError::Index(_) => "index",
            WikiError::Config(_) => "config",
            WikiError::Cancelled => "cancelled",
            WikiError::Io(_) => "io",
            WikiError::Serialization(_) => "serialization",
            WikiError::Http(_) => "http",
        }
    }

    /// Process exit code for the CLI surface
    pub fn exit_code(&self) -> i32 {
        match self {
            WikiError::Config(_) => 2,
            WikiError::Llm(_) | WikiError::Http(_) => 3,
            WikiError::Io(_) | WikiError::Serialization(_) | WikiError::Index(_) => 4,
            WikiError::Cancelled => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let timeout_error = WikiError::Llm(LlmError::Timeout);
        assert!(timeout_error.is_retryable());

        let config_error = WikiError::Config("invalid config".to_string());
        assert!(!config_error.is_retryable());
    }

    #[test]
    fn test_error_category() {
        let llm_error = WikiError::Llm(LlmError::Timeout);
        assert_eq!(llm_error.category(), "llm");

        let index_error = WikiError::Index(IndexError::NotTrained);
        assert_eq!(index_error.category(), "index");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(WikiError::Config("x".into()).exit_code(), 2);
        assert_eq!(WikiError::Llm(LlmError::Timeout).exit_code(), 3);
        assert_eq!(WikiError::Index(IndexError::NotTrained).exit_code(), 4);
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let long = "x".repeat(500);
        let excerpt = body_excerpt(&long);
        assert!(excerpt.len() < 220);
        assert!(excerpt.ends_with("..."));

        assert_eq!(body_excerpt("short"), "short");
    }
}
