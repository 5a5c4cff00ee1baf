//! Configuration management for the wiki + RAG engine

use serde::{Deserialize, Serialize};

/// Main configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Generator provider configuration
    pub provider: GeneratorConfig,

    /// Embedder configuration
    #[serde(default)]
    pub embedder: EmbedderConfig,

    /// Scanner configuration
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Chunker configuration
    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Conversation store configuration
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Supported generator providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Anthropic,
    Qwen,
    Google,
    Ollama,
    Azure,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Qwen => write!(f, "qwen"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Azure => write!(f, "azure"),
        }
    }
}

/// Configuration for the generative language model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Provider variant
    pub provider: ProviderKind,

    /// Model identifier passed to the provider
    pub model: String,

    /// API key (usually from an environment variable)
    pub api_key: Option<String>,

    /// Base URL override; required for Ollama and Azure
    pub base_url: Option<String>,

    /// DashScope workspace identifier (Qwen only)
    pub workspace_id: Option<String>,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens for generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Forward the repository access token to generation requests
    #[serde(default)]
    pub forward_access_token: bool,

    /// Repository access token, only attached when forwarding is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout() -> u64 {
    30
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            workspace_id: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
            forward_access_token: false,
            access_token: None,
        }
    }
}

/// Supported embedder variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local TF-IDF embedder, trained on the indexed corpus
    #[default]
    Local,
    /// Remote OpenAI-compatible embeddings endpoint
    OpenAI,
}

/// Embedder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Embedder variant
    #[serde(default)]
    pub provider: EmbedderKind,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Target vector dimension
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Batch size for embed_batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// API key for the remote variant
    pub api_key: Option<String>,

    /// Base URL for the remote variant
    pub base_url: Option<String>,

    /// Local embedder tuning
    #[serde(default)]
    pub local: LocalEmbedderConfig,
}

fn default_embedding_model() -> String {
    "tfidf".to_string()
}

fn default_dimensions() -> usize {
    512
}

fn default_batch_size() -> usize {
    10
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::Local,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            api_key: None,
            base_url: None,
            local: LocalEmbedderConfig::default(),
        }
    }
}

/// Tuning knobs for the local TF-IDF embedder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEmbedderConfig {
    /// Weighting algorithm; only "tfidf" is recognized
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Minimum document frequency for a term to enter the vocabulary
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Maximum document frequency ratio before a term is dropped as noise
    #[serde(default = "default_max_df")]
    pub max_df: f32,
}

fn default_algorithm() -> String {
    "tfidf".to_string()
}

fn default_max_features() -> usize {
    10_000
}

fn default_min_df() -> usize {
    1
}

fn default_max_df() -> f32 {
    0.95
}

impl Default for LocalEmbedderConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            max_features: default_max_features(),
            min_df: default_min_df(),
            max_df: default_max_df(),
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Directories excluded in addition to the defaults
    #[serde(default)]
    pub excluded_dirs: Vec<String>,

    /// File patterns excluded in addition to the defaults
    #[serde(default)]
    pub excluded_files: Vec<String>,

    /// When non-empty, only these top-level directories are scanned
    #[serde(default)]
    pub included_dirs: Vec<String>,

    /// When non-empty, only files matching these patterns are kept
    #[serde(default)]
    pub included_files: Vec<String>,

    /// Per-file byte cap
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Total token budget for indexing
    #[serde(default = "default_max_total_tokens")]
    pub max_tokens: usize,
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_max_total_tokens() -> usize {
    100_000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: Vec::new(),
            excluded_files: Vec::new(),
            included_dirs: Vec::new(),
            included_files: Vec::new(),
            max_file_size: default_max_file_size(),
            max_tokens: default_max_total_tokens(),
        }
    }
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between neighboring chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum messages retained per session; oldest are dropped first
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,
}

fn default_max_history_length() -> usize {
    50
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history_length: default_max_history_length(),
        }
    }
}

impl WikiConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration; the pipeline refuses to start on failure
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::WikiError;

        if self.provider.model.is_empty() {
            return Err(WikiError::Config("Model name cannot be empty".to_string()));
        }

        if self.provider.provider == ProviderKind::OpenAI {
            if let Some(key) = &self.provider.api_key {
                if !key.starts_with("sk-") {
                    return Err(WikiError::Config(
                        "OpenAI API keys must start with 'sk-'".to_string(),
                    ));
                }
            }
        }

        match self.provider.provider {
            ProviderKind::Ollama | ProviderKind::Azure => {
                if self.provider.base_url.is_none() {
                    return Err(WikiError::Config(format!(
                        "base_url is required for the {} provider",
                        self.provider.provider
                    )));
                }
            }
            _ => {}
        }

        if self.provider.workspace_id.is_some() && self.provider.provider != ProviderKind::Qwen {
            return Err(WikiError::Config(
                "workspace_id is only valid for the qwen provider".to_string(),
            ));
        }

        if self.embedder.dimensions == 0 {
            return Err(WikiError::Config(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }

        if self.embedder.batch_size == 0 {
            return Err(WikiError::Config(
                "Embedding batch size must be greater than 0".to_string(),
            ));
        }

        if self.embedder.model.is_empty() {
            return Err(WikiError::Config(
                "Embedding model name cannot be empty".to_string(),
            ));
        }

        if self.chunker.chunk_size == 0 {
            return Err(WikiError::Config(
                "Chunk size must be greater than 0".to_string(),
            ));
        }

        if self.chunker.chunk_overlap >= self.chunker.chunk_size {
            return Err(WikiError::Config(
                "Chunk overlap must be smaller than the chunk size".to_string(),
            ));
        }

        if self.conversation.max_history_length == 0 {
            return Err(WikiError::Config(
                "Max history length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WikiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedder.dimensions, 512);
        assert_eq!(config.chunker.chunk_size, 1000);
        assert_eq!(config.conversation.max_history_length, 50);
    }

    #[test]
    fn test_config_validation() {
        let mut config = WikiConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Bad OpenAI key prefix should fail
        config.provider.api_key = Some("key-123".to_string());
        assert!(config.validate().is_err());

        // Reset and test zero dimensions
        config = WikiConfig::default();
        config.embedder.dimensions = 0;
        assert!(config.validate().is_err());

        // Ollama without a base URL should fail
        config = WikiConfig::default();
        config.provider.provider = ProviderKind::Ollama;
        assert!(config.validate().is_err());
        config.provider.base_url = Some("http://localhost:11434".to_string());
        assert!(config.validate().is_ok());

        // workspace_id outside qwen should fail
        config = WikiConfig::default();
        config.provider.workspace_id = Some("ws-1".to_string());
        assert!(config.validate().is_err());
        config.provider.provider = ProviderKind::Qwen;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_stay_below_chunk_size() {
        let mut config = WikiConfig::default();
        config.chunker.chunk_size = 100;
        config.chunker.chunk_overlap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = WikiConfig::default();
        let dir = std::env::temp_dir().join("repowiki-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        config.to_file(&path).unwrap();
        let loaded = WikiConfig::from_file(&path).unwrap();
        assert_eq!(loaded.provider.model, config.provider.model);
        assert_eq!(loaded.embedder.dimensions, config.embedder.dimensions);

        std::fs::remove_dir_all(&dir).ok();
    }
}
