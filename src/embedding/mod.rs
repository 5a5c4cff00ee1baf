//! Embedder abstraction and variants

pub mod remote;
pub mod tfidf;

pub use remote::RemoteEmbedder;
pub use tfidf::TfIdfEmbedder;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of an embedder configuration, used for cache invalidation.
///
/// Two snapshots are compatible only when provider, model and dimensions all
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderFingerprint {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl std::fmt::Display for EmbedderFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.provider, self.model, self.dimensions)
    }
}

/// Trait implemented by every embedder variant
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fingerprint identifying this embedder configuration
    fn fingerprint(&self) -> EmbedderFingerprint;

    /// Fixed output vector length
    fn dimensions(&self) -> usize;

    /// Hook for stateful embedders that must see the corpus before encoding.
    ///
    /// Remote variants ignore it; the local TF-IDF variant builds its
    /// vocabulary and IDF table here and rejects `embed` until it has run.
    fn train(&self, _corpus: &[String]) {}

    /// Encode one text into a vector of `dimensions()` floats
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
