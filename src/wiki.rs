//! Derived wiki documents built from project analysis

use crate::analyzer::{DirectoryNode, ProjectAnalysis};
use crate::llm::{GenerationRequest, Generator};
use crate::scanner::{FileType, SourceFile};
use crate::store::{Document, DocumentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The prose sections indexed as `wiki/<section>` documents
pub const WIKI_SECTIONS: &[&str] = &[
    "overview",
    "architecture",
    "file-structure",
    "dependencies",
    "setup",
    "usage",
];

/// A code excerpt attached to an analysis section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    pub description: String,
    pub file_path: String,
}

/// One code-analysis section of the wiki
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAnalysisSection {
    pub title: String,
    pub content: String,
    pub files: Vec<String>,
    pub code_blocks: Vec<CodeBlock>,
}

/// The full set of derived wiki documents for a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiData {
    pub project_name: String,
    pub overview: String,
    pub architecture: String,
    pub file_structure: String,
    pub code_analysis: Vec<CodeAnalysisSection>,
    pub dependencies: String,
    pub setup: String,
    pub usage: String,
    pub generated_at: DateTime<Utc>,
}

/// Builds wiki documents from a [`ProjectAnalysis`], optionally enriching
/// the overview through the generator.
pub struct WikiBuilder {
    generator: Option<Arc<dyn Generator>>,
}

impl WikiBuilder {
    /// Builder producing purely deterministic sections
    pub fn new() -> Self {
        Self { generator: None }
    }

    /// Builder that asks the generator to polish the overview
    pub fn with_generator(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Build the wiki for an analyzed repository
    pub async fn build(&self, analysis: &ProjectAnalysis, files: &[SourceFile]) -> WikiData {
        let mut overview = render_overview(analysis);

        if let Some(generator) = &self.generator {
            let request = GenerationRequest {
                prompt: format!(
                    "Write a concise project overview for {} in markdown. Keep it factual.",
                    analysis.project_name
                ),
                context: vec![overview.clone()],
                temperature: 0.3,
                max_tokens: 800,
            };
            match generator.generate(&request).await {
                Ok(response) => {
                    debug!("Overview enriched by {}", response.model);
                    overview = response.text;
                }
                Err(e) => {
                    warn!("Overview enrichment failed, keeping deterministic text: {}", e);
                }
            }
        }

        let wiki = WikiData {
            project_name: analysis.project_name.clone(),
            overview,
            architecture: render_architecture(analysis),
            file_structure: render_file_structure(analysis),
            code_analysis: build_code_analysis(analysis, files),
            dependencies: render_dependencies(analysis),
            setup: render_setup(analysis),
            usage: render_usage(analysis),
            generated_at: Utc::now(),
        };

        info!(
            "Built wiki for {}: {} code-analysis sections",
            wiki.project_name,
            wiki.code_analysis.len()
        );
        wiki
    }
}

impl Default for WikiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Materialize the six prose sections as indexable documents
pub fn wiki_documents(wiki: &WikiData) -> Vec<Document> {
    let section = |name: &str, title: &str, content: &str| {
        let mut metadata = HashMap::new();
        metadata.insert("section".to_string(), name.to_string());
        metadata.insert("project".to_string(), wiki.project_name.clone());
        Document {
            id: format!("wiki/{}", name),
            title: format!("{} — {}", wiki.project_name, title),
            content: content.to_string(),
            path: format!("wiki/{}", name),
            doc_type: DocumentType::Wiki,
            metadata,
        }
    };

    vec![
        section("overview", "Overview", &wiki.overview),
        section("architecture", "Architecture", &wiki.architecture),
        section("file-structure", "File Structure", &wiki.file_structure),
        section("dependencies", "Dependencies", &wiki.dependencies),
        section("setup", "Setup", &wiki.setup),
        section("usage", "Usage", &wiki.usage),
    ]
}

fn render_overview(analysis: &ProjectAnalysis) -> String {
    let mut text = format!(
        "# {}\n\n{} project with {} files ({} bytes).\n",
        analysis.project_name, analysis.project_type, analysis.total_files, analysis.total_size
    );

    if let Some(language) = analysis.primary_language() {
        text.push_str(&format!("\nPrimary language: {}.\n", language));
    }
    if !analysis.languages.is_empty() {
        text.push_str("\n## Languages\n\n");
        for stats in &analysis.languages {
            text.push_str(&format!(
                "- {}: {} files ({:.1}%)\n",
                stats.language, stats.file_count, stats.percentage
            ));
        }
    }
    if !analysis.entry_points.is_empty() {
        text.push_str("\n## Entry Points\n\n");
        for entry in &analysis.entry_points {
            text.push_str(&format!("- `{}`\n", entry));
        }
    }

    text
}

fn render_architecture(analysis: &ProjectAnalysis) -> String {
    let architecture = &analysis.architecture;
    let mut text = format!(
        "# Architecture\n\nStructure: {:?} repository.\n",
        architecture.architecture_type
    );

    if let Some(framework) = &architecture.framework {
        text.push_str(&format!("Framework: {}.\n", framework));
    }
    if let Some(build_tool) = &architecture.build_tool {
        text.push_str(&format!("Build tool: {}.\n", build_tool));
    }
    if let Some(package_manager) = &architecture.package_manager {
        text.push_str(&format!("Package manager: {}.\n", package_manager));
    }
    if !architecture.layers.is_empty() {
        text.push_str(&format!("\nLayers: {}.\n", architecture.layers.join(", ")));
    }
    if !architecture.design_patterns.is_empty() {
        text.push_str(&format!(
            "Recognized patterns: {}.\n",
            architecture.design_patterns.join(", ")
        ));
    }

    text
}

fn render_file_structure(analysis: &ProjectAnalysis) -> String {
    let mut text = String::from("# File Structure\n\n```\n");
    render_tree(&analysis.tree, 0, &mut text);
    text.push_str("```\n");
    text
}

fn render_tree(node: &DirectoryNode, depth: usize, out: &mut String) {
    if depth > 0 {
        out.push_str(&"  ".repeat(depth - 1));
        out.push_str(&format!(
            "{}/ ({} files, {} bytes)\n",
            node.name, node.file_count, node.total_size
        ));
    }
    for child in &node.children {
        render_tree(child, depth + 1, out);
    }
}

fn build_code_analysis(
    analysis: &ProjectAnalysis,
    files: &[SourceFile],
) -> Vec<CodeAnalysisSection> {
    // Group the most important code files by their top-level directory.
    let mut by_dir: Vec<(String, Vec<&SourceFile>)> = Vec::new();
    let mut code_files: Vec<&SourceFile> = files
        .iter()
        .filter(|file| matches!(file.file_type, FileType::Code))
        .collect();
    code_files.sort_by(|a, b| b.importance.cmp(&a.importance));

    for file in code_files {
        let dir = file
            .relative_path
            .split_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_else(|| "root".to_string());
        match by_dir.iter_mut().find(|(name, _)| *name == dir) {
            Some((_, group)) => group.push(file),
            None => by_dir.push((dir, vec![file])),
        }
    }

    by_dir
        .into_iter()
        .take(4)
        .map(|(dir, group)| {
            let files: Vec<String> = group
                .iter()
                .map(|file| file.relative_path.clone())
                .collect();

            let code_blocks: Vec<CodeBlock> = group
                .iter()
                .take(3)
                .map(|file| CodeBlock {
                    language: file.language.clone(),
                    code: excerpt(&file.content, 20),
                    description: format!(
                        "Excerpt from `{}` ({} tokens)",
                        file.relative_path, file.token_estimate
                    ),
                    file_path: file.relative_path.clone(),
                })
                .collect();

            let content = format!(
                "Code under `{}`: {} files, led by `{}`.",
                dir,
                group.len(),
                group[0].relative_path
            );

            CodeAnalysisSection {
                title: format!("Code Analysis: {}", dir),
                content,
                files,
                code_blocks,
            }
        })
        .collect()
}

fn render_dependencies(analysis: &ProjectAnalysis) -> String {
    let deps = &analysis.dependencies;
    let mut text = String::from("# Dependencies\n\n");

    if deps.dependencies.is_empty() && deps.dev_dependencies.is_empty() {
        text.push_str("No declared dependencies were found.\n");
        return text;
    }

    if !deps.dependencies.is_empty() {
        text.push_str("## Runtime\n\n");
        for dep in &deps.dependencies {
            text.push_str(&format!("- {}\n", dep));
        }
    }
    if !deps.dev_dependencies.is_empty() {
        text.push_str("\n## Development\n\n");
        for dep in &deps.dev_dependencies {
            text.push_str(&format!("- {}\n", dep));
        }
    }
    if !deps.peer_dependencies.is_empty() {
        text.push_str("\n## Peer\n\n");
        for dep in &deps.peer_dependencies {
            text.push_str(&format!("- {}\n", dep));
        }
    }
    if !deps.internal_edges.is_empty() {
        text.push_str(&format!(
            "\n{} internal import edges were discovered.\n",
            deps.internal_edges.len()
        ));
    }

    text
}

fn render_setup(analysis: &ProjectAnalysis) -> String {
    let mut text = String::from("# Setup\n\n");
    match analysis.architecture.build_tool.as_deref() {
        Some("cargo") => text.push_str("```\ncargo build\ncargo test\n```\n"),
        Some("npm") => text.push_str("```\nnpm install\nnpm test\n```\n"),
        Some("pip") => {
            text.push_str("```\npip install -r requirements.txt\n```\n");
        }
        Some("go") => text.push_str("```\ngo build ./...\ngo test ./...\n```\n"),
        Some("maven") => text.push_str("```\nmvn install\n```\n"),
        Some("gradle") => text.push_str("```\ngradle build\n```\n"),
        Some("make") => text.push_str("```\nmake\n```\n"),
        _ => text.push_str("No recognized build tooling; see the repository documentation.\n"),
    }
    text
}

fn render_usage(analysis: &ProjectAnalysis) -> String {
    let mut text = String::from("# Usage\n\n");
    if analysis.entry_points.is_empty() {
        text.push_str("No canonical entry points were detected.\n");
    } else {
        text.push_str("Entry points:\n\n");
        for entry in &analysis.entry_points {
            text.push_str(&format!("- `{}`\n", entry));
        }
    }
    text
}

/// First `lines` lines of a file
fn excerpt(content: &str, lines: usize) -> String {
    content
        .lines()
        .take(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ProjectAnalyzer;
    use std::path::PathBuf;

    fn sample_files() -> Vec<SourceFile> {
        let file = |path: &str, content: &str, file_type: FileType, language: Option<&str>| {
            SourceFile {
                path: PathBuf::from(path),
                relative_path: path.to_string(),
                size: content.len() as u64,
                modified: None,
                extension: String::new(),
                file_type,
                language: language.map(str::to_string),
                token_estimate: content.len().div_ceil(4),
                content: content.to_string(),
                imports: Vec::new(),
                exports: Vec::new(),
                importance: if path.ends_with("main.rs") { 200 } else { 60 },
            }
        };

        vec![
            file(
                "Cargo.toml",
                "[dependencies]\nserde = \"1\"\n",
                FileType::Config,
                None,
            ),
            file("src/main.rs", "fn main() {}\n", FileType::Code, Some("rust")),
            file("src/lib.rs", "pub mod a;\n", FileType::Code, Some("rust")),
        ]
    }

    #[tokio::test]
    async fn test_build_produces_all_sections() {
        let files = sample_files();
        let analysis = ProjectAnalyzer::analyze("demo", &files);
        let wiki = WikiBuilder::new().build(&analysis, &files).await;

        assert_eq!(wiki.project_name, "demo");
        assert!(wiki.overview.contains("demo"));
        assert!(wiki.architecture.contains("Build tool: cargo"));
        assert!(wiki.dependencies.contains("serde"));
        assert!(wiki.setup.contains("cargo build"));
        assert!(wiki.usage.contains("src/main.rs"));
        assert!(!wiki.code_analysis.is_empty());
    }

    #[tokio::test]
    async fn test_wiki_documents_are_the_six_sections() {
        let files = sample_files();
        let analysis = ProjectAnalyzer::analyze("demo", &files);
        let wiki = WikiBuilder::new().build(&analysis, &files).await;

        let documents = wiki_documents(&wiki);
        assert_eq!(documents.len(), WIKI_SECTIONS.len());
        for (document, section) in documents.iter().zip(WIKI_SECTIONS) {
            assert_eq!(document.id, format!("wiki/{}", section));
            assert_eq!(document.doc_type, DocumentType::Wiki);
            assert_eq!(document.metadata.get("section").unwrap(), section);
        }
    }

    #[tokio::test]
    async fn test_code_analysis_groups_by_directory() {
        let files = sample_files();
        let analysis = ProjectAnalyzer::analyze("demo", &files);
        let wiki = WikiBuilder::new().build(&analysis, &files).await;

        let section = &wiki.code_analysis[0];
        assert_eq!(section.title, "Code Analysis: src");
        assert_eq!(section.files.len(), 2);
        assert_eq!(section.code_blocks[0].file_path, "src/main.rs");
        assert_eq!(section.code_blocks[0].language.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_empty_repo_wiki() {
        let analysis = ProjectAnalyzer::analyze("empty", &[]);
        let wiki = WikiBuilder::new().build(&analysis, &[]).await;

        assert!(wiki.code_analysis.is_empty());
        assert!(wiki.dependencies.contains("No declared dependencies"));
        assert_eq!(wiki_documents(&wiki).len(), 6);
    }

    mod enrichment {
        use super::*;
        use crate::config::ProviderKind;
        use crate::error::LlmError;
        use crate::llm::GenerationResponse;
        use async_trait::async_trait;

        struct FixedGenerator {
            fail: bool,
        }

        #[async_trait]
        impl Generator for FixedGenerator {
            fn provider(&self) -> ProviderKind {
                ProviderKind::Ollama
            }

            fn model(&self) -> &str {
                "fixed"
            }

            async fn generate(
                &self,
                _request: &GenerationRequest,
            ) -> crate::error::Result<GenerationResponse> {
                if self.fail {
                    return Err(LlmError::GenerationFailed {
                        status: 500,
                        excerpt: "down".to_string(),
                    }
                    .into());
                }
                Ok(GenerationResponse {
                    text: "A polished overview.".to_string(),
                    tokens_used: None,
                    model: "fixed".to_string(),
                    finish_reason: None,
                })
            }
        }

        #[tokio::test]
        async fn test_generator_enriches_the_overview() {
            let files = sample_files();
            let analysis = ProjectAnalyzer::analyze("demo", &files);
            let wiki = WikiBuilder::with_generator(Arc::new(FixedGenerator { fail: false }))
                .build(&analysis, &files)
                .await;

            assert_eq!(wiki.overview, "A polished overview.");
        }

        #[tokio::test]
        async fn test_enrichment_failure_keeps_deterministic_overview() {
            let files = sample_files();
            let analysis = ProjectAnalyzer::analyze("demo", &files);
            let wiki = WikiBuilder::with_generator(Arc::new(FixedGenerator { fail: true }))
                .build(&analysis, &files)
                .await;

            // The deterministic overview survives the failed call.
            assert!(wiki.overview.contains("demo"));
            assert!(wiki.overview.contains("Entry Points"));
        }
    }
}
