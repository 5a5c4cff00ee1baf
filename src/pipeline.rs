//! End-to-end index build orchestration

use crate::analyzer::{ProjectAnalysis, ProjectAnalyzer};
use crate::chunker::Chunker;
use crate::config::WikiConfig;
use crate::embedding::Embedder;
use crate::error::{IndexError, Result, WikiError};
use crate::index_cache::IndexCache;
use crate::llm::Generator;
use crate::router::ProviderRouter;
use crate::scanner::{apply_token_budget, Scanner};
use crate::store::{Document, VectorStore};
use crate::wiki::{wiki_documents, WikiBuilder, WikiData};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared cancellation signal for long operations.
///
/// A cancelled build persists nothing; the snapshot is only written after a
/// successful end-to-end run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WikiError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Accounting for one build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub files_indexed: usize,
    pub chunks: usize,
    pub wiki_sections: usize,
    pub total_documents: usize,
    pub from_cache: bool,
    pub duration_ms: u128,
}

/// Everything a build produces
pub struct BuildOutput {
    pub store: VectorStore,
    pub wiki: WikiData,
    pub analysis: ProjectAnalysis,
    pub report: BuildReport,
}

/// Orchestrates scan → analyze → chunk → embed → wiki → snapshot
pub struct WikiPipeline {
    config: WikiConfig,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
}

impl WikiPipeline {
    /// Build a pipeline from configuration via the provider router
    pub fn new(config: WikiConfig) -> Result<Self> {
        let generator = ProviderRouter::generator(&config)?;
        let embedder = ProviderRouter::embedder(&config)?;
        Ok(Self {
            config,
            generator,
            embedder,
        })
    }

    /// Build a pipeline with explicit provider instances (used by tests)
    pub fn from_parts(
        config: WikiConfig,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            generator,
            embedder,
        }
    }

    pub fn config(&self) -> &WikiConfig {
        &self.config
    }

    pub fn generator(&self) -> Arc<dyn Generator> {
        self.generator.clone()
    }

    /// Build or refresh the index for one repository.
    ///
    /// Embedding is the only remote stage; it runs serialized batches with a
    /// single retry per batch. Snapshots are written only after the whole
    /// build succeeds, and write failures never fail the build.
    pub async fn build(&self, repo_root: &Path, cancel: &CancelToken) -> Result<BuildOutput> {
        let started = Instant::now();
        let project_name = project_name_of(repo_root);
        let cache = IndexCache::new(repo_root);

        let scanner = Scanner::new(self.config.scanner.clone());
        let files = scanner.scan(repo_root, cancel)?;
        let files = apply_token_budget(files, self.config.scanner.max_tokens);
        cancel.ensure_active()?;

        let analysis = ProjectAnalyzer::analyze(&project_name, &files);

        let chunker = Chunker::new(&self.config.chunker, self.config.scanner.max_tokens);
        let mut chunks = Vec::new();
        for file in &files {
            match chunker.chunk_file(file) {
                Ok(file_chunks) => chunks.extend(file_chunks),
                Err(WikiError::Index(IndexError::OversizedChunk(path))) => {
                    warn!("Skipping {}: a logical unit exceeds the token budget", path);
                }
                Err(e) => return Err(e),
            }
        }
        cancel.ensure_active()?;

        let wiki = WikiBuilder::new().build(&analysis, &files).await;

        // An empty repository produces an empty index; the wiki sections are
        // only indexed alongside actual source chunks.
        let mut documents: Vec<Document> =
            chunks.iter().map(|chunk| chunk.to_document()).collect();
        if !documents.is_empty() {
            documents.extend(wiki_documents(&wiki));
        }
        let content_hash = content_hash(&documents);

        // Stateful embedders see the full corpus before any encoding; the
        // query path depends on this even when vectors come from cache.
        let corpus: Vec<String> = documents
            .iter()
            .map(|document| document.content.clone())
            .collect();
        self.embedder.train(&corpus);

        let mut store = VectorStore::new(self.embedder.clone());
        let mut from_cache = false;

        if let Some(snapshot) = cache.load_vector_snapshot(&self.embedder.fingerprint()) {
            if snapshot.content_hash == content_hash {
                let mut vectors: HashMap<String, Vec<f32>> = snapshot
                    .documents
                    .into_iter()
                    .filter_map(|document| document.vector.map(|v| (document.id, v)))
                    .collect();

                for document in &documents {
                    if let Some(vector) = vectors.remove(&document.id) {
                        store.insert_embedded(document.clone(), vector)?;
                    }
                }

                if store.len() == documents.len() {
                    from_cache = true;
                    info!("Restored {} vectors from cache", store.len());
                } else {
                    store.clear();
                }
            }
        }

        if !from_cache {
            self.embed_documents(&mut store, &documents, cancel).await?;
        }
        cancel.ensure_active()?;

        let report = BuildReport {
            files_indexed: files.len(),
            chunks: chunks.len(),
            wiki_sections: wiki_documents(&wiki).len(),
            total_documents: store.len(),
            from_cache,
            duration_ms: started.elapsed().as_millis(),
        };

        if let Err(e) = cache.save_vector_snapshot(&store.snapshot(&content_hash)) {
            warn!("Failed to write vector snapshot: {}", e);
        }
        if let Err(e) = cache.save_wiki(&wiki) {
            warn!("Failed to write wiki cache: {}", e);
        }
        if let Err(e) = cache.save_analysis(&analysis) {
            warn!("Failed to write analysis cache: {}", e);
        }
        if let Err(e) = cache.record_build(&project_name) {
            warn!("Failed to update the global cache index: {}", e);
        }

        info!(
            "Built index for {}: {} documents in {} ms (cache: {})",
            project_name, report.total_documents, report.duration_ms, report.from_cache
        );

        Ok(BuildOutput {
            store,
            wiki,
            analysis,
            report,
        })
    }

    /// Serialized batch embedding with one retry per batch
    async fn embed_documents(
        &self,
        store: &mut VectorStore,
        documents: &[Document],
        cancel: &CancelToken,
    ) -> Result<()> {
        let batch_size = self.config.embedder.batch_size;

        for batch in documents.chunks(batch_size) {
            cancel.ensure_active()?;

            let texts: Vec<String> = batch
                .iter()
                .map(|document| document.content.clone())
                .collect();

            let vectors = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("Embedding batch failed, retrying once: {}", e);
                    self.embedder.embed_batch(&texts).await?
                }
            };

            for (document, vector) in batch.iter().zip(vectors) {
                store.insert_embedded(document.clone(), vector)?;
            }
        }

        Ok(())
    }
}

fn project_name_of(repo_root: &Path) -> String {
    repo_root
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(repo_root)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string())
}

/// Deterministic hash over document ids and contents
fn content_hash(documents: &[Document]) -> String {
    let mut hasher = DefaultHasher::new();
    for document in documents {
        document.id.hash(&mut hasher);
        document.content.hash(&mut hasher);
    }
    format!("{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentType;

    fn document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: id.to_string(),
            content: content.to_string(),
            path: id.to_string(),
            doc_type: DocumentType::Code,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.ensure_active().is_ok());

        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.ensure_active(),
            Err(WikiError::Cancelled)
        ));
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let a = vec![document("a", "one"), document("b", "two")];
        let b = vec![document("a", "one"), document("b", "two")];
        let c = vec![document("a", "one"), document("b", "changed")];

        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
    }

    #[test]
    fn test_project_name_fallback() {
        assert_eq!(project_name_of(Path::new("/nonexistent/widget")), "widget");
    }
}
