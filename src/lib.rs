//! Repository wiki + RAG engine
//!
//! A library that turns a local source tree into a queryable knowledge base:
//! - Scanner and chunker discover and split repository files
//! - Pluggable embedders (remote HTTP or a local TF-IDF fallback) feed an
//!   in-memory vector store with on-disk snapshots
//! - A RAG engine retrieves top-k chunks and asks a generator provider for a
//!   grounded answer with a calibrated confidence score
//! - A deep-research protocol runs bounded multi-iteration investigations
//!
//! # Example
//!
//! ```rust,no_run
//! use repowiki::{CancelToken, QueryOptions, RagEngine, WikiConfig, WikiPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WikiConfig::default();
//!     let pipeline = WikiPipeline::new(config)?;
//!
//!     let output = pipeline
//!         .build(std::path::Path::new("."), &CancelToken::new())
//!         .await?;
//!
//!     let engine = RagEngine::new(output.store, pipeline.generator());
//!     let answer = engine
//!         .query("What does this project do?", &QueryOptions::default())
//!         .await?;
//!
//!     println!("{}", answer.answer);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod chunker;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod index_cache;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod research;
pub mod router;
pub mod scanner;
pub mod store;
pub mod wiki;

// Re-export main types
pub use analyzer::{
    ArchitectureInfo, ArchitectureType, DependencyInfo, DirectoryNode, LanguageStats,
    ProjectAnalysis, ProjectAnalyzer,
};
pub use chunker::{Chunk, Chunker};
pub use config::{
    ChunkerConfig, ConversationConfig, EmbedderConfig, EmbedderKind, GeneratorConfig,
    ProviderKind, ScannerConfig, WikiConfig,
};
pub use conversation::{
    ConversationMessage, ConversationSession, ConversationStore, MessageRole,
};
pub use embedding::{Embedder, EmbedderFingerprint, RemoteEmbedder, TfIdfEmbedder};
pub use error::{IndexError, LlmError, Result, WikiError};
pub use index_cache::{GlobalIndex, GlobalIndexEntry, IndexCache};
pub use llm::{GenerationRequest, GenerationResponse, Generator, Message, Role};
pub use pipeline::{BuildOutput, BuildReport, CancelToken, WikiPipeline};
pub use rag::{QueryAnswer, QueryMetadata, QueryOptions, RagEngine};
pub use research::{
    DeepResearch, DeepResearchState, RepositoryFingerprint, ResearchOutcome, ResearchStage,
};
pub use router::ProviderRouter;
pub use scanner::{FileType, Scanner, SourceFile};
pub use store::{
    Document, DocumentType, IndexSnapshot, ScoredDocument, SearchOutcome, StoreStats, VectorStore,
};
pub use wiki::{CodeAnalysisSection, CodeBlock, WikiBuilder, WikiData};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
