//! Project analysis: type, architecture, languages, dependencies

use crate::scanner::{is_entry_point, FileType, SourceFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Directory names recognized as architectural layers
const KNOWN_LAYERS: &[&str] = &[
    "api",
    "app",
    "core",
    "ui",
    "components",
    "services",
    "controllers",
    "models",
    "views",
    "utils",
    "lib",
    "domain",
    "infrastructure",
    "handlers",
    "routes",
    "middleware",
];

/// Design pattern keywords searched in file names and exported symbols
const PATTERN_KEYWORDS: &[(&str, &str)] = &[
    ("factory", "Factory"),
    ("builder", "Builder"),
    ("adapter", "Adapter"),
    ("observer", "Observer"),
    ("singleton", "Singleton"),
    ("repository", "Repository"),
    ("strategy", "Strategy"),
    ("decorator", "Decorator"),
    ("middleware", "Middleware"),
];

/// Coarse repository architecture classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchitectureType {
    Monorepo,
    Single,
    Microservice,
}

/// Per-language statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageStats {
    pub language: String,
    pub file_count: usize,
    pub total_size: u64,
    pub percentage: f32,
}

/// A directory tree node with rolled-up totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub path: String,
    pub total_size: u64,
    pub token_estimate: usize,
    pub file_count: usize,
    #[serde(default)]
    pub children: Vec<DirectoryNode>,
}

/// Architecture record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureInfo {
    pub architecture_type: ArchitectureType,
    pub framework: Option<String>,
    pub build_tool: Option<String>,
    pub package_manager: Option<String>,
    pub layers: Vec<String>,
    pub design_patterns: Vec<String>,
}

/// Declared and internal dependencies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    pub peer_dependencies: Vec<String>,
    /// (importing file, imported module) edges inside the repository
    pub internal_edges: Vec<(String, String)>,
}

/// Trimmed view of one scanned file kept in the analysis snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub relative_path: String,
    pub file_type: FileType,
    pub language: Option<String>,
    pub size: u64,
    pub token_estimate: usize,
    pub importance: u32,
}

/// Result of analyzing a scanned repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub project_name: String,
    pub project_type: String,
    pub total_files: usize,
    pub total_size: u64,
    pub files: Vec<FileSummary>,
    pub languages: Vec<LanguageStats>,
    pub tree: DirectoryNode,
    pub architecture: ArchitectureInfo,
    pub dependencies: DependencyInfo,
    pub entry_points: Vec<String>,
    pub main_directories: Vec<String>,
}

impl ProjectAnalysis {
    /// Dominant language of the repository, if any code was found
    pub fn primary_language(&self) -> Option<&str> {
        self.languages.first().map(|stats| stats.language.as_str())
    }
}

/// Derives a [`ProjectAnalysis`] from scanner output
pub struct ProjectAnalyzer;

impl ProjectAnalyzer {
    /// Analyze a scanned repository
    pub fn analyze(project_name: &str, files: &[SourceFile]) -> ProjectAnalysis {
        let total_size: u64 = files.iter().map(|f| f.size).sum();

        let languages = language_stats(files);
        let tree = build_tree(files);
        let project_type = detect_project_type(files, &languages);
        let architecture = detect_architecture(files);
        let dependencies = collect_dependencies(files);

        let entry_points: Vec<String> = files
            .iter()
            .filter(|file| {
                let name = file
                    .relative_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&file.relative_path);
                is_entry_point(name)
            })
            .map(|file| file.relative_path.clone())
            .collect();

        let mut top_dirs: Vec<(&str, u64)> = tree
            .children
            .iter()
            .map(|node| (node.name.as_str(), node.total_size))
            .collect();
        top_dirs.sort_by(|a, b| b.1.cmp(&a.1));
        let main_directories: Vec<String> = top_dirs
            .into_iter()
            .take(5)
            .map(|(name, _)| name.to_string())
            .collect();

        info!(
            "Analyzed {}: {} files, type {}, {:?}",
            project_name,
            files.len(),
            project_type,
            architecture.architecture_type
        );

        ProjectAnalysis {
            project_name: project_name.to_string(),
            project_type,
            total_files: files.len(),
            total_size,
            files: files
                .iter()
                .map(|file| FileSummary {
                    relative_path: file.relative_path.clone(),
                    file_type: file.file_type,
                    language: file.language.clone(),
                    size: file.size,
                    token_estimate: file.token_estimate,
                    importance: file.importance,
                })
                .collect(),
            languages,
            tree,
            architecture,
            dependencies,
            entry_points,
            main_directories,
        }
    }
}

fn language_stats(files: &[SourceFile]) -> Vec<LanguageStats> {
    let mut by_language: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for file in files {
        if let Some(language) = &file.language {
            let entry = by_language.entry(language).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += file.size;
        }
    }

    let total_bytes: u64 = by_language.values().map(|(_, bytes)| bytes).sum();
    let mut stats: Vec<LanguageStats> = by_language
        .into_iter()
        .map(|(language, (count, bytes))| LanguageStats {
            language: language.to_string(),
            file_count: count,
            total_size: bytes,
            percentage: if total_bytes > 0 {
                (bytes as f32 / total_bytes as f32) * 100.0
            } else {
                0.0
            },
        })
        .collect();
    stats.sort_by(|a, b| b.total_size.cmp(&a.total_size));
    stats
}

fn build_tree(files: &[SourceFile]) -> DirectoryNode {
    let mut root = DirectoryNode {
        name: String::new(),
        path: String::new(),
        total_size: 0,
        token_estimate: 0,
        file_count: 0,
        children: Vec::new(),
    };

    for file in files {
        root.total_size += file.size;
        root.token_estimate += file.token_estimate;
        root.file_count += 1;

        let components: Vec<&str> = file.relative_path.split('/').collect();
        insert_rollup(
            &mut root,
            &components[..components.len().saturating_sub(1)],
            file,
        );
    }

    sort_tree(&mut root);
    root
}

fn insert_rollup(node: &mut DirectoryNode, components: &[&str], file: &SourceFile) {
    let Some((component, rest)) = components.split_first() else {
        return;
    };

    let position = match node.children.iter().position(|c| c.name == *component) {
        Some(position) => position,
        None => {
            let path = if node.path.is_empty() {
                (*component).to_string()
            } else {
                format!("{}/{}", node.path, component)
            };
            node.children.push(DirectoryNode {
                name: (*component).to_string(),
                path,
                total_size: 0,
                token_estimate: 0,
                file_count: 0,
                children: Vec::new(),
            });
            node.children.len() - 1
        }
    };

    let child = &mut node.children[position];
    child.total_size += file.size;
    child.token_estimate += file.token_estimate;
    child.file_count += 1;
    insert_rollup(child, rest, file);
}

fn sort_tree(node: &mut DirectoryNode) {
    node.children.sort_by(|a, b| a.name.cmp(&b.name));
    for child in &mut node.children {
        sort_tree(child);
    }
}

fn detect_project_type(files: &[SourceFile], languages: &[LanguageStats]) -> String {
    let has = |name: &str| files.iter().any(|f| f.relative_path == name);

    if has("Cargo.toml") {
        return "rust".to_string();
    }
    if has("go.mod") {
        return "go".to_string();
    }
    if has("package.json") {
        if has("tsconfig.json") {
            return "typescript".to_string();
        }
        return "javascript".to_string();
    }
    if has("pyproject.toml") || has("requirements.txt") || has("setup.py") {
        return "python".to_string();
    }
    if has("pom.xml") || has("build.gradle") {
        return "java".to_string();
    }

    languages
        .first()
        .map(|stats| stats.language.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

fn detect_architecture(files: &[SourceFile]) -> ArchitectureInfo {
    let manifest_names = ["Cargo.toml", "package.json", "go.mod", "pyproject.toml"];
    let nested_manifests = files
        .iter()
        .filter(|file| {
            file.relative_path.contains('/')
                && manifest_names
                    .iter()
                    .any(|name| file.relative_path.ends_with(name))
        })
        .count();

    let has_compose = files
        .iter()
        .any(|file| file.relative_path.starts_with("docker-compose"));
    let has_services_dir = files
        .iter()
        .any(|file| file.relative_path.starts_with("services/"));

    let architecture_type = if has_compose && has_services_dir {
        ArchitectureType::Microservice
    } else if nested_manifests >= 2 {
        ArchitectureType::Monorepo
    } else {
        ArchitectureType::Single
    };

    let mut layers: Vec<String> = Vec::new();
    for file in files {
        for component in file.relative_path.split('/').rev().skip(1) {
            if KNOWN_LAYERS.contains(&component) && !layers.iter().any(|l| l == component) {
                layers.push(component.to_string());
            }
        }
    }
    layers.sort();

    let mut design_patterns: Vec<String> = Vec::new();
    for file in files {
        let haystack = format!(
            "{} {}",
            file.relative_path.to_lowercase(),
            file.exports.join(" ").to_lowercase()
        );
        for (keyword, label) in PATTERN_KEYWORDS {
            if haystack.contains(keyword) && !design_patterns.iter().any(|p| p == label) {
                design_patterns.push((*label).to_string());
            }
        }
    }
    design_patterns.sort();

    let (framework, build_tool, package_manager) = detect_toolchain(files);

    debug!(
        "Architecture: {:?}, {} layers, {} patterns",
        architecture_type,
        layers.len(),
        design_patterns.len()
    );

    ArchitectureInfo {
        architecture_type,
        framework,
        build_tool,
        package_manager,
        layers,
        design_patterns,
    }
}

fn detect_toolchain(
    files: &[SourceFile],
) -> (Option<String>, Option<String>, Option<String>) {
    let find = |name: &str| files.iter().find(|f| f.relative_path == name);

    if let Some(manifest) = find("Cargo.toml") {
        let framework = ["axum", "actix-web", "rocket", "warp", "tauri"]
            .iter()
            .find(|name| manifest.content.contains(*name))
            .map(|name| (*name).to_string());
        return (
            framework,
            Some("cargo".to_string()),
            Some("cargo".to_string()),
        );
    }

    if let Some(manifest) = find("package.json") {
        let framework = ["next", "react", "vue", "angular", "svelte", "express"]
            .iter()
            .find(|name| manifest.content.contains(&format!("\"{}\"", name)))
            .map(|name| (*name).to_string());
        return (framework, Some("npm".to_string()), Some("npm".to_string()));
    }

    if find("pyproject.toml").is_some() || find("requirements.txt").is_some() {
        let framework = files
            .iter()
            .find_map(|file| {
                if file.relative_path == "manage.py" {
                    Some("django".to_string())
                } else if file.language.as_deref() == Some("python")
                    && file.imports.iter().any(|i| i == "flask")
                {
                    Some("flask".to_string())
                } else {
                    None
                }
            });
        return (framework, Some("pip".to_string()), Some("pip".to_string()));
    }

    if find("go.mod").is_some() {
        return (
            None,
            Some("go".to_string()),
            Some("go modules".to_string()),
        );
    }

    if find("pom.xml").is_some() {
        return (None, Some("maven".to_string()), Some("maven".to_string()));
    }
    if find("build.gradle").is_some() {
        return (None, Some("gradle".to_string()), Some("gradle".to_string()));
    }

    let build_tool = files
        .iter()
        .any(|f| f.relative_path == "Makefile")
        .then(|| "make".to_string());
    (None, build_tool, None)
}

fn collect_dependencies(files: &[SourceFile]) -> DependencyInfo {
    let mut info = DependencyInfo::default();

    for file in files {
        match file.relative_path.as_str() {
            "package.json" => {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&file.content) {
                    collect_json_keys(&json, "dependencies", &mut info.dependencies);
                    collect_json_keys(&json, "devDependencies", &mut info.dev_dependencies);
                    collect_json_keys(&json, "peerDependencies", &mut info.peer_dependencies);
                }
            }
            "Cargo.toml" => {
                if let Ok(manifest) = file.content.parse::<toml::Table>() {
                    collect_toml_keys(&manifest, "dependencies", &mut info.dependencies);
                    collect_toml_keys(&manifest, "dev-dependencies", &mut info.dev_dependencies);
                }
            }
            "requirements.txt" => {
                for line in file.content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let name: String = line
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                        .collect();
                    if !name.is_empty() {
                        info.dependencies.push(name);
                    }
                }
            }
            _ => {}
        }

        // Relative imports become internal edges.
        for import in &file.imports {
            if import.starts_with('.') {
                info.internal_edges
                    .push((file.relative_path.clone(), import.clone()));
            }
        }
    }

    info
}

fn collect_json_keys(json: &serde_json::Value, field: &str, out: &mut Vec<String>) {
    if let Some(map) = json.get(field).and_then(|v| v.as_object()) {
        out.extend(map.keys().cloned());
    }
}

fn collect_toml_keys(manifest: &toml::Table, field: &str, out: &mut Vec<String>) {
    if let Some(table) = manifest.get(field).and_then(|v| v.as_table()) {
        out.extend(table.keys().cloned());
    }
}
