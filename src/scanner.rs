//! Repository scanning: traversal, filtering and file classification

use crate::config::ScannerConfig;
use crate::error::Result;
use crate::pipeline::CancelToken;
use crate::store::DocumentType;
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories never recursed into, in addition to user configuration
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "dist",
    "build",
    "out",
    "target",
    "bin",
    "obj",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".next",
    ".nuxt",
    "coverage",
    "venv",
    "env",
    ".venv",
    ".cache",
    ".idea",
    ".gradle",
];

/// File patterns dropped by default: logs, locks, binaries, minified
/// bundles, maps and platform metadata
const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "*.log",
    "*.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "*.min.js",
    "*.min.css",
    "*.map",
    ".DS_Store",
    "Thumbs.db",
    "*.pyc",
    "*.pyo",
    "*.class",
    "*.o",
    "*.so",
    "*.dylib",
    "*.dll",
    "*.exe",
    "*.wasm",
    "*.db",
    "*.sqlite",
    "*.zip",
    "*.tar",
    "*.gz",
    "*.7z",
    "*.jpg",
    "*.jpeg",
    "*.png",
    "*.gif",
    "*.bmp",
    "*.ico",
    "*.pdf",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.eot",
    "*.mp3",
    "*.mp4",
];

/// Hidden directories that are still scanned
const HIDDEN_DIR_ALLOWLIST: &[&str] = &[".github", ".vscode"];

/// File names that mark a repository entry point
const ENTRY_POINT_NAMES: &[&str] = &[
    "main.py",
    "main.rs",
    "main.go",
    "main.c",
    "main.cpp",
    "main.java",
    "main.js",
    "main.ts",
    "index.js",
    "index.ts",
    "app.py",
    "app.js",
    "app.ts",
    "server.js",
    "server.py",
    "lib.rs",
    "__main__.py",
    "manage.py",
    "program.cs",
];

/// Classification of a scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Code,
    Doc,
    Config,
    Test,
    Build,
    Asset,
    Data,
}

impl From<FileType> for DocumentType {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Code => DocumentType::Code,
            FileType::Doc => DocumentType::Doc,
            FileType::Config => DocumentType::Config,
            FileType::Test => DocumentType::Test,
            FileType::Build => DocumentType::Build,
            FileType::Asset => DocumentType::Asset,
            FileType::Data => DocumentType::Data,
        }
    }
}

/// One scanned repository file with content and derived metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub extension: String,
    pub file_type: FileType,
    pub language: Option<String>,
    pub token_estimate: usize,
    pub content: String,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub importance: u32,
}

/// Repository scanner
pub struct Scanner {
    config: ScannerConfig,
    import_re: regex::Regex,
    require_re: regex::Regex,
    export_re: regex::Regex,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        // Infallible: the patterns are fixed.
        let import_re =
            regex::Regex::new(r#"import\s+[^;]*?from\s+['"]([^'"]+)['"]"#).expect("import regex");
        let require_re =
            regex::Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("require regex");
        let export_re = regex::Regex::new(
            r"export\s+(?:default\s+)?(?:class|function|const|let|var)\s+(\w+)",
        )
        .expect("export regex");

        Self {
            config,
            import_re,
            require_re,
            export_re,
        }
    }

    /// Walk the tree and return every file passing the filter rules, sorted
    /// by descending importance.
    ///
    /// Traversal is depth-first and alphabetical at each level, so output is
    /// deterministic for a fixed filesystem.
    pub fn scan(&self, root: &Path, cancel: &CancelToken) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();
        self.walk(root, root, 0, &mut files, cancel)?;

        // Stable sort keeps traversal order among equal scores.
        files.sort_by(|a, b| b.importance.cmp(&a.importance));

        debug!("Scan found {} files under {}", files.len(), root.display());
        Ok(files)
    }

    fn walk(
        &self,
        root: &Path,
        dir: &Path,
        depth: usize,
        out: &mut Vec<SourceFile>,
        cancel: &CancelToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(crate::error::WikiError::Cancelled);
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                return Ok(());
            }
        };

        let mut names: Vec<(String, PathBuf, bool)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let is_dir = entry.file_type().ok()?.is_dir();
                let name = entry.file_name().to_string_lossy().into_owned();
                Some((name, path, is_dir))
            })
            .collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir) in names {
            if is_dir {
                if self.should_recurse(&name, depth) {
                    self.walk(root, &path, depth + 1, out, cancel)?;
                }
            } else if self.should_keep_file(&name, depth) {
                if let Some(file) = self.process_file(root, &path, &name) {
                    out.push(file);
                }
            }
        }

        Ok(())
    }

    fn should_recurse(&self, name: &str, depth: usize) -> bool {
        if DEFAULT_EXCLUDED_DIRS.contains(&name) {
            return false;
        }
        if self
            .config
            .excluded_dirs
            .iter()
            .any(|pattern| pattern_matches(pattern, name))
        {
            return false;
        }
        if name.starts_with('.') && !HIDDEN_DIR_ALLOWLIST.contains(&name) {
            return false;
        }
        // A non-empty include list restricts the top level to those dirs.
        if depth == 0 && !self.config.included_dirs.is_empty() {
            return self
                .config
                .included_dirs
                .iter()
                .any(|pattern| pattern_matches(pattern.trim_matches('/'), name));
        }
        true
    }

    fn should_keep_file(&self, name: &str, depth: usize) -> bool {
        if depth == 0 && !self.config.included_dirs.is_empty() {
            return false;
        }

        let explicitly_included = self
            .config
            .included_files
            .iter()
            .any(|pattern| pattern_matches(pattern, name));

        if !self.config.included_files.is_empty() && !explicitly_included {
            return false;
        }

        if name.starts_with('.') && !explicitly_included {
            return false;
        }

        let excluded = DEFAULT_EXCLUDED_FILES
            .iter()
            .any(|pattern| pattern_matches(pattern, name))
            || self
                .config
                .excluded_files
                .iter()
                .any(|pattern| pattern_matches(pattern, name));

        !excluded || explicitly_included
    }

    fn process_file(&self, root: &Path, path: &Path, name: &str) -> Option<SourceFile> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                return None;
            }
        };

        let size = metadata.len();
        if size > self.config.max_file_size {
            debug!(
                "Skipping {} ({} bytes over the {} byte cap)",
                path.display(),
                size,
                self.config.max_file_size
            );
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping undecodable file {}: {}", path.display(), e);
                return None;
            }
        };
        if content.is_empty() {
            debug!("Skipping empty file {}", path.display());
            return None;
        }

        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let modified = metadata
            .modified()
            .ok()
            .map(|time| DateTime::<Utc>::from(time));

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let name_lower = name.to_lowercase();
        let (file_type, language) = classify(&name_lower, &extension);
        let depth = relative_path.matches('/').count();
        let importance = importance_score(&name_lower, file_type, depth);

        let (imports, exports) = if file_type == FileType::Code {
            (self.extract_imports(&content), self.extract_exports(&content))
        } else {
            (Vec::new(), Vec::new())
        };

        Some(SourceFile {
            path: path.to_path_buf(),
            relative_path,
            size,
            modified,
            extension,
            file_type,
            language,
            token_estimate: estimate_tokens(&content),
            content,
            imports,
            exports,
            importance,
        })
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut imports: Vec<String> = self
            .import_re
            .captures_iter(content)
            .chain(self.require_re.captures_iter(content))
            .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
            .collect();
        imports.dedup();
        imports
    }

    fn extract_exports(&self, content: &str) -> Vec<String> {
        self.export_re
            .captures_iter(content)
            .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

/// Cut a prioritized file list down to a total token budget.
///
/// Files are consumed in order; consumption stops at the first file that
/// would push the total over the budget.
pub fn apply_token_budget(files: Vec<SourceFile>, max_tokens: usize) -> Vec<SourceFile> {
    let mut total = 0usize;
    let mut kept = Vec::new();
    for file in files {
        if total + file.token_estimate > max_tokens {
            debug!(
                "Token budget reached after {} files ({} tokens)",
                kept.len(),
                total
            );
            break;
        }
        total += file.token_estimate;
        kept.push(file);
    }
    kept
}

/// Match a filter pattern against a name.
///
/// Patterns containing `*` or `?` are globs (`*` any run, `?` any single
/// char), anchored and case-insensitive; anything else is an exact match.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern.contains('*') || pattern.contains('?') {
        let mut regex_str = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => regex_str.push_str(".*"),
                '?' => regex_str.push('.'),
                c => regex_str.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex_str.push('$');

        RegexBuilder::new(&regex_str)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    } else {
        pattern.eq_ignore_ascii_case(name)
    }
}

/// Estimate tokens as ceil(len / 4)
pub fn estimate_tokens(content: &str) -> usize {
    content.len().div_ceil(4)
}

fn classify(name_lower: &str, extension: &str) -> (FileType, Option<String>) {
    let (mut file_type, language) = classify_extension(extension);

    // Filename overrides win over the extension map.
    if name_lower.contains("test") || name_lower.contains("spec") {
        file_type = FileType::Test;
    } else if name_lower.contains("config") || name_lower.contains("setting") {
        file_type = FileType::Config;
    }
    if name_lower == "dockerfile" || name_lower.contains("docker") {
        file_type = FileType::Build;
    } else if matches!(name_lower, "makefile" | "justfile" | "rakefile" | "cmakelists.txt") {
        file_type = FileType::Build;
    }

    (file_type, language)
}

fn classify_extension(extension: &str) -> (FileType, Option<String>) {
    let language = match extension {
        "rs" => Some("rust"),
        "py" => Some("python"),
        "js" | "jsx" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "go" => Some("go"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "hpp" => Some("cpp"),
        "cs" => Some("csharp"),
        "rb" => Some("ruby"),
        "php" => Some("php"),
        "swift" => Some("swift"),
        "kt" | "kts" => Some("kotlin"),
        "scala" => Some("scala"),
        "sh" | "bash" | "zsh" => Some("shell"),
        "lua" => Some("lua"),
        "dart" => Some("dart"),
        "vue" => Some("vue"),
        "svelte" => Some("svelte"),
        "html" => Some("html"),
        "css" | "scss" | "less" => Some("css"),
        "sql" => Some("sql"),
        _ => None,
    };

    if language.is_some() {
        return (FileType::Code, language.map(str::to_string));
    }

    let file_type = match extension {
        "md" | "markdown" | "rst" | "txt" | "adoc" | "org" => FileType::Doc,
        "json" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "xml" | "env"
        | "properties" => FileType::Config,
        "gradle" | "cmake" | "mk" => FileType::Build,
        "svg" => FileType::Asset,
        "csv" | "tsv" | "jsonl" | "ndjson" => FileType::Data,
        _ => FileType::Data,
    };

    (file_type, None)
}

/// Whether a file name marks a canonical repository entry point
pub fn is_entry_point(name: &str) -> bool {
    ENTRY_POINT_NAMES.contains(&name.to_lowercase().as_str())
}

fn importance_score(name_lower: &str, file_type: FileType, depth: usize) -> u32 {
    let mut score = 0u32;

    if is_entry_point(name_lower) {
        score += 100;
    }

    score += match file_type {
        FileType::Code => 50,
        FileType::Config => 40,
        FileType::Doc => 30,
        FileType::Test => 20,
        _ => 10,
    };

    score += 20u32.saturating_sub(2 * depth as u32);

    if name_lower.contains("main") || name_lower.contains("index") {
        score += 30;
    }

    score
}
