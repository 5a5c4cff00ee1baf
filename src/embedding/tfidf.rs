//! Local TF-IDF embedder
//!
//! A stateful fallback embedder that needs no network access: `train` builds
//! a vocabulary and IDF table from the corpus being indexed, after which
//! `embed` projects texts into a fixed-dimension space. Encoding before
//! training is a typed error, because snapshot fingerprints are only
//! meaningful relative to a trained state.

use crate::config::LocalEmbedderConfig;
use crate::embedding::{Embedder, EmbedderFingerprint};
use crate::error::{IndexError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Trained vocabulary state
struct TfIdfState {
    /// Terms in first-appearance order
    vocabulary: Vec<String>,
    /// Term -> vocabulary index
    term_index: HashMap<String, usize>,
    /// IDF per vocabulary index, ln(N / df)
    idf: Vec<f32>,
}

/// Local TF-IDF embedder
pub struct TfIdfEmbedder {
    dimensions: usize,
    config: LocalEmbedderConfig,
    state: RwLock<Option<TfIdfState>>,
}

impl TfIdfEmbedder {
    /// Create an untrained embedder with the given output dimension
    pub fn new(dimensions: usize, config: LocalEmbedderConfig) -> Self {
        Self {
            dimensions,
            config,
            state: RwLock::new(None),
        }
    }

    /// Whether `train` has been called
    pub fn is_trained(&self) -> bool {
        self.state.read().expect("tfidf state lock poisoned").is_some()
    }

    /// Build the vocabulary and IDF table from a corpus of documents
    fn fit(&self, corpus: &[String]) {
        let total_docs = corpus.len().max(1);

        // First-appearance order across the corpus; document frequency per term.
        let mut vocabulary: Vec<String> = Vec::new();
        let mut term_index: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: Vec<usize> = Vec::new();

        for document in corpus {
            let mut seen: Vec<usize> = Vec::new();
            for token in tokenize(document) {
                let index = match term_index.get(&token) {
                    Some(&index) => index,
                    None => {
                        let index = vocabulary.len();
                        vocabulary.push(token.clone());
                        term_index.insert(token, index);
                        document_frequency.push(0);
                        index
                    }
                };
                if !seen.contains(&index) {
                    document_frequency[index] += 1;
                    seen.push(index);
                }
            }
        }

        // Frequency filtering, preserving appearance order.
        let max_df_count =
            ((total_docs as f32) * self.config.max_df).ceil().max(1.0) as usize;
        let mut kept: Vec<(String, usize)> = Vec::new();
        for (term, &df) in vocabulary.iter().zip(document_frequency.iter()) {
            if df >= self.config.min_df && df <= max_df_count {
                kept.push((term.clone(), df));
            }
            if kept.len() >= self.config.max_features {
                break;
            }
        }

        let idf: Vec<f32> = kept
            .iter()
            .map(|(_, df)| ((total_docs as f32) / (*df as f32)).ln())
            .collect();

        let mut new_index = HashMap::with_capacity(kept.len());
        let vocabulary: Vec<String> = kept
            .into_iter()
            .enumerate()
            .map(|(i, (term, _))| {
                new_index.insert(term.clone(), i);
                term
            })
            .collect();

        info!(
            "Trained TF-IDF embedder: {} terms over {} documents",
            vocabulary.len(),
            total_docs
        );

        *self.state.write().expect("tfidf state lock poisoned") = Some(TfIdfState {
            vocabulary,
            term_index: new_index,
            idf,
        });
    }

    /// Number of terms in the trained vocabulary, 0 if untrained
    pub fn vocabulary_size(&self) -> usize {
        self.state
            .read()
            .expect("tfidf state lock poisoned")
            .as_ref()
            .map(|s| s.vocabulary.len())
            .unwrap_or(0)
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let guard = self.state.read().expect("tfidf state lock poisoned");
        let state = guard.as_ref().ok_or(IndexError::NotTrained)?;

        let mut term_counts: HashMap<usize, f32> = HashMap::new();
        for token in tokenize(text) {
            if let Some(&index) = state.term_index.get(&token) {
                *term_counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        // Unknown terms contribute nothing; an all-zero vector is legal.
        let mut vector = vec![0.0f32; self.dimensions];
        for (index, tf) in term_counts {
            let position = index % self.dimensions;
            vector[position] += tf * state.idf[index];
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        debug!("Encoded text of {} chars into TF-IDF vector", text.len());
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for TfIdfEmbedder {
    fn fingerprint(&self) -> EmbedderFingerprint {
        EmbedderFingerprint {
            provider: "local".to_string(),
            model: self.config.algorithm.clone(),
            dimensions: self.dimensions,
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn train(&self, corpus: &[String]) {
        self.fit(corpus);
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.encode(text)).collect()
    }
}

/// Tokenize for vocabulary building: lowercase, non-word characters become
/// separators, tokens shorter than three characters are dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.len() >= 3)
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WikiError;

    fn trained_embedder() -> TfIdfEmbedder {
        let embedder = TfIdfEmbedder::new(64, LocalEmbedderConfig::default());
        embedder.train(&[
            "fn main launches the http server".to_string(),
            "the http server routes requests".to_string(),
            "vector search ranks documents".to_string(),
        ]);
        embedder
    }

    #[tokio::test]
    async fn test_embed_before_train_is_typed_error() {
        let embedder = TfIdfEmbedder::new(64, LocalEmbedderConfig::default());
        let err = embedder.embed("anything").await.unwrap_err();
        assert!(matches!(err, WikiError::Index(IndexError::NotTrained)));
    }

    #[tokio::test]
    async fn test_embed_has_fixed_dimension_and_unit_norm() {
        let embedder = trained_embedder();
        let vector = embedder.embed("http server").await.unwrap();
        assert_eq!(vector.len(), 64);

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_oov_text_embeds_to_zero_vector() {
        let embedder = trained_embedder();
        let vector = embedder.embed("zzz qqq www").await.unwrap();
        assert!(vector.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = trained_embedder();
        let a = embedder.embed("http server routes").await.unwrap();
        let b = embedder.embed("http server routes").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = tokenize("Fn main() -> io::Result<()> { x }");
        assert!(tokens.contains(&"main".to_string()));
        assert!(tokens.contains(&"result".to_string()));
        assert!(!tokens.iter().any(|t| t.len() < 3));
    }

    #[test]
    fn test_vocabulary_keeps_first_appearance_order() {
        let embedder = TfIdfEmbedder::new(32, LocalEmbedderConfig::default());
        embedder.train(&["alpha beta gamma".to_string(), "beta delta".to_string()]);

        let guard = embedder.state.read().unwrap();
        let state = guard.as_ref().unwrap();
        assert_eq!(state.vocabulary[0], "alpha");
        assert_eq!(state.vocabulary[1], "beta");
        assert_eq!(state.vocabulary[2], "gamma");
        assert_eq!(state.vocabulary[3], "delta");
    }

    #[test]
    fn test_max_features_caps_vocabulary() {
        let config = LocalEmbedderConfig {
            max_features: 2,
            ..LocalEmbedderConfig::default()
        };
        let embedder = TfIdfEmbedder::new(32, config);
        embedder.train(&["alpha beta gamma delta".to_string()]);
        assert_eq!(embedder.vocabulary_size(), 2);
    }

    #[test]
    fn test_fingerprint() {
        let embedder = TfIdfEmbedder::new(512, LocalEmbedderConfig::default());
        let fingerprint = embedder.fingerprint();
        assert_eq!(fingerprint.provider, "local");
        assert_eq!(fingerprint.model, "tfidf");
        assert_eq!(fingerprint.dimensions, 512);
    }
}
