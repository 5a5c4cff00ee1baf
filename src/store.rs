//! In-memory vector store with cosine top-k search and snapshotting

use crate::embedding::{Embedder, EmbedderFingerprint};
use crate::error::{IndexError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot schema version; loaders treat any other value as a cache-miss.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Type tag of an indexed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Code,
    Doc,
    Config,
    Test,
    Build,
    Asset,
    Data,
    Wiki,
}

/// An indexed unit: a source chunk or a derived wiki section.
///
/// Immutable once inserted into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Real file path for source chunks, `wiki/<section>` for wiki documents
    pub path: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A document scored against a query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub relevance_score: f32,
}

/// Result of a top-k search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub documents: Vec<ScoredDocument>,
    /// Number of stored documents considered
    pub total_results: usize,
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_documents: usize,
    pub dimensions: usize,
}

/// One stored embedding: the vector plus the document it materializes
struct StoredEmbedding {
    vector: Vec<f32>,
    document: Document,
}

/// Serialized preview of one stored document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub id: String,
    /// First 500 characters of the content
    pub content_preview: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Full vector, persisted so a content-unchanged rebuild can skip
    /// re-encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Serializable snapshot of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub embedder_fingerprint: EmbedderFingerprint,
    /// Hash over the chunker output this snapshot was built from
    pub content_hash: String,
    pub stats: StoreStats,
    pub documents: Vec<DocumentSnapshot>,
}

/// Append-only in-memory vector store.
///
/// Backed by a plain `Vec` so insertion order is explicit; search ties break
/// toward earlier-added documents.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    entries: Vec<StoredEmbedding>,
}

impl VectorStore {
    /// Create an empty store bound to an embedder
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    /// The bound embedder
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and insert one document
    pub async fn add(&mut self, document: Document) -> Result<()> {
        let vector = self.embedder.embed(&document.content).await?;
        self.insert_embedded(document, vector)
    }

    /// Embed and insert a batch of documents
    pub async fn add_batch(&mut self, documents: Vec<Document>) -> Result<()> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (document, vector) in documents.into_iter().zip(vectors) {
            self.insert_embedded(document, vector)?;
        }
        Ok(())
    }

    /// Insert a document with a pre-computed vector
    pub fn insert_embedded(&mut self, document: Document, vector: Vec<f32>) -> Result<()> {
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(IndexError::InvalidDimension {
                expected,
                actual: vector.len(),
            }
            .into());
        }
        debug!("Indexed document: {}", document.id);
        self.entries.push(StoredEmbedding { vector, document });
        Ok(())
    }

    /// Cosine top-k search for a query string
    pub async fn search(&self, query: &str, k: usize) -> Result<SearchOutcome> {
        if self.entries.is_empty() {
            return Ok(SearchOutcome {
                documents: Vec::new(),
                total_results: 0,
            });
        }

        let query_vector = self.embedder.embed(query).await?;

        let mut scored: Vec<ScoredDocument> = self
            .entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                relevance_score: cosine_similarity(&query_vector, &entry.vector),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_results = scored.len();
        scored.truncate(k);

        debug!(
            "Search returned {} of {} documents",
            scored.len(),
            total_results
        );

        Ok(SearchOutcome {
            documents: scored,
            total_results,
        })
    }

    /// Store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_documents: self.entries.len(),
            dimensions: self.embedder.dimensions(),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all stored documents
    pub fn clear(&mut self) {
        info!("Cleared {} documents from the vector store", self.entries.len());
        self.entries.clear();
    }

    /// Build a serializable snapshot of the current store
    pub fn snapshot(&self, content_hash: &str) -> IndexSnapshot {
        IndexSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            embedder_fingerprint: self.embedder.fingerprint(),
            content_hash: content_hash.to_string(),
            stats: self.stats(),
            documents: self
                .entries
                .iter()
                .map(|entry| DocumentSnapshot {
                    id: entry.document.id.clone(),
                    content_preview: preview(&entry.document.content),
                    metadata: entry.document.metadata.clone(),
                    vector: Some(entry.vector.clone()),
                })
                .collect(),
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and degenerate (zero-norm) vectors score 0, so they
/// rank last under a descending sort.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// First 500 characters of a content string, on a char boundary
fn preview(content: &str) -> String {
    const PREVIEW_CHARS: usize = 500;
    if content.len() <= PREVIEW_CHARS {
        return content.to_string();
    }
    content.chars().take(PREVIEW_CHARS).collect()
}
