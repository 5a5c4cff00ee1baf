//! Retrieval-augmented query engine

use crate::error::{Result, WikiError};
use crate::llm::{estimate_tokens, strip_markdown_fence, GenerationRequest, Generator};
use crate::store::{ScoredDocument, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fixed answer returned when retrieval finds nothing relevant
pub const NO_INFORMATION_ANSWER: &str =
    "I could not find relevant information in the indexed repository to answer this question.";

/// Prefix of the degraded answer returned when generation fails
pub const GENERATION_FALLBACK_PREFIX: &str =
    "Answer generation failed; the most relevant retrieved excerpts follow.\n\n";

const DEFAULT_MAX_RESULTS: usize = 5;
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Per-query overrides
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Caller-supplied additional context, prepended to retrieved items
    pub context: Option<String>,
    pub max_results: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Generation parameters and accounting attached to an answer
#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retrieved_chunks: usize,
    pub estimated_tokens: usize,
}

/// A grounded answer with its sources and confidence
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<ScoredDocument>,
    pub confidence: f32,
    pub processing_time_ms: u128,
    pub metadata: QueryMetadata,
}

/// Retrieval + generation over one repository index
pub struct RagEngine {
    store: VectorStore,
    generator: Arc<dyn Generator>,
}

impl RagEngine {
    pub fn new(store: VectorStore, generator: Arc<dyn Generator>) -> Self {
        Self { store, generator }
    }

    /// The underlying vector store
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Answer a question grounded in retrieved chunks
    pub async fn query(&self, question: &str, options: &QueryOptions) -> Result<QueryAnswer> {
        let started = Instant::now();

        let max_results = options.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        let threshold = options
            .similarity_threshold
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        let temperature = options.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let retrieved = self.similar(question, max_results, threshold).await?;

        if retrieved.is_empty() {
            debug!("No documents above threshold {} for query", threshold);
            return Ok(QueryAnswer {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
                processing_time_ms: started.elapsed().as_millis(),
                metadata: QueryMetadata {
                    model: self.generator.model().to_string(),
                    temperature,
                    max_tokens,
                    retrieved_chunks: 0,
                    estimated_tokens: 0,
                },
            });
        }

        let mut context: Vec<String> = Vec::new();
        if let Some(extra) = &options.context {
            context.push(format!("Additional Context:\n{}", extra));
        }
        context.extend(retrieved.iter().map(context_item));

        let confidence = confidence_score(&retrieved);

        let request = GenerationRequest {
            prompt: question.to_string(),
            context: context.clone(),
            temperature,
            max_tokens,
        };

        let answer = match self.generator.generate(&request).await {
            Ok(response) => strip_markdown_fence(&response.text),
            Err(WikiError::Llm(e)) => {
                warn!("Generation failed, degrading to retrieved excerpts: {}", e);
                excerpt_fallback(&context)
            }
            Err(WikiError::Http(e)) => {
                warn!("Generation failed, degrading to retrieved excerpts: {}", e);
                excerpt_fallback(&context)
            }
            Err(e) => return Err(e),
        };

        let estimated_tokens = estimate_tokens(question)
            + context.iter().map(|item| estimate_tokens(item)).sum::<usize>()
            + estimate_tokens(&answer);
        let retrieved_chunks = retrieved.len();

        info!(
            "Answered query with {} sources, confidence {:.2}",
            retrieved_chunks, confidence
        );

        Ok(QueryAnswer {
            answer,
            sources: retrieved,
            confidence,
            processing_time_ms: started.elapsed().as_millis(),
            metadata: QueryMetadata {
                model: self.generator.model().to_string(),
                temperature,
                max_tokens,
                retrieved_chunks,
                estimated_tokens,
            },
        })
    }

    /// Similarity-only retrieval: top-k documents above the threshold,
    /// best first.
    pub async fn similar(
        &self,
        question: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>> {
        let outcome = self.store.search(question, k).await?;
        Ok(outcome
            .documents
            .into_iter()
            .filter(|scored| scored.relevance_score >= threshold)
            .collect())
    }
}

/// Render one retrieved document as a context item
fn context_item(scored: &ScoredDocument) -> String {
    let document = &scored.document;
    let mut header = format!("File: {}", document.path);

    if let (Some(start), Some(end)) = (
        document.metadata.get("start_line"),
        document.metadata.get("end_line"),
    ) {
        header.push_str(&format!(" (Lines {}-{})", start, end));
    }
    if let Some(language) = document.metadata.get("language") {
        header.push_str(&format!(" [{}]", language));
    }

    format!(
        "{}\nSimilarity: {:.1}%\nContent:\n{}",
        header,
        scored.relevance_score * 100.0,
        document.content
    )
}

/// Confidence: best similarity scaled by how many documents survived,
/// saturating at three.
fn confidence_score(retrieved: &[ScoredDocument]) -> f32 {
    let max_similarity = retrieved
        .iter()
        .map(|scored| scored.relevance_score)
        .fold(0.0f32, f32::max);
    let coverage = (retrieved.len() as f32 / 3.0).min(1.0);
    (max_similarity * coverage).min(1.0)
}

/// Deterministic degraded answer: the first two context items
fn excerpt_fallback(context: &[String]) -> String {
    let excerpts = context
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{}{}", GENERATION_FALLBACK_PREFIX, excerpts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, DocumentType};
    use std::collections::HashMap;

    fn scored(path: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: Document {
                id: path.to_string(),
                title: path.to_string(),
                content: "content".to_string(),
                path: path.to_string(),
                doc_type: DocumentType::Code,
                metadata: HashMap::new(),
            },
            relevance_score: score,
        }
    }

    #[test]
    fn test_confidence_saturates_at_three_documents() {
        assert_eq!(confidence_score(&[scored("a", 0.9)]), 0.9 * (1.0 / 3.0));
        let three = vec![scored("a", 0.9), scored("b", 0.5), scored("c", 0.4)];
        assert!((confidence_score(&three) - 0.9).abs() < 1e-6);
        let four = vec![
            scored("a", 0.9),
            scored("b", 0.5),
            scored("c", 0.4),
            scored("d", 0.1),
        ];
        assert!((confidence_score(&four) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_is_monotonic_in_similarity() {
        let weaker = vec![scored("a", 0.5), scored("b", 0.4)];
        let stronger = vec![scored("a", 0.5), scored("b", 0.4), scored("c", 0.8)];
        assert!(confidence_score(&stronger) >= confidence_score(&weaker));
    }

    #[test]
    fn test_context_item_format() {
        let mut document = scored("src/main.rs", 0.876);
        document
            .document
            .metadata
            .insert("start_line".to_string(), "10".to_string());
        document
            .document
            .metadata
            .insert("end_line".to_string(), "42".to_string());
        document
            .document
            .metadata
            .insert("language".to_string(), "rust".to_string());

        let item = context_item(&document);
        assert!(item.starts_with("File: src/main.rs (Lines 10-42) [rust]\n"));
        assert!(item.contains("Similarity: 87.6%"));
        assert!(item.ends_with("Content:\ncontent"));
    }

    #[test]
    fn test_excerpt_fallback_takes_two_items() {
        let context = vec![
            "first".to_string(),
            "second".to_string(),
            "third".to_string(),
        ];
        let fallback = excerpt_fallback(&context);
        assert!(fallback.starts_with(GENERATION_FALLBACK_PREFIX));
        assert!(fallback.contains("first\n\nsecond"));
        assert!(!fallback.contains("third"));
    }
}
