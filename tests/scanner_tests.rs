//! Tests for the repository scanner

use repowiki::pipeline::CancelToken;
use repowiki::scanner::Scanner;
use repowiki::{FileType, ScannerConfig};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(root: &Path, config: ScannerConfig) -> Vec<String> {
    Scanner::new(config)
        .scan(root, &CancelToken::new())
        .unwrap()
        .into_iter()
        .map(|file| file.relative_path)
        .collect()
}

#[test]
fn test_default_excludes_drop_node_modules() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/main.js", "console.log('hi');\n");
    write(
        dir.path(),
        "node_modules/react/index.js",
        "module.exports = {};\n",
    );
    write(dir.path(), "debug.log", "noise\n");
    write(dir.path(), "package-lock.json", "{}\n");

    let paths = scan(dir.path(), ScannerConfig::default());
    assert_eq!(paths, vec!["src/main.js".to_string()]);
}

#[test]
fn test_included_dirs_act_as_allowlist() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/lib.rs", "pub fn a() {}\n");
    write(dir.path(), "scripts/run.sh", "echo hi\n");
    write(dir.path(), "README.md", "# readme\n");

    let config = ScannerConfig {
        included_dirs: vec!["src".to_string()],
        ..ScannerConfig::default()
    };
    let paths = scan(dir.path(), config);
    assert!(paths.iter().all(|path| path.starts_with("src/")));
    assert_eq!(paths.len(), 1);
}

#[test]
fn test_hidden_files_excluded_unless_allowlisted() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".env", "SECRET=1\n");
    write(dir.path(), ".hidden/notes.txt", "hidden\n");
    write(dir.path(), ".github/workflows/ci.yml", "on: push\n");
    write(dir.path(), "main.py", "print('hi')\n");

    let paths = scan(dir.path(), ScannerConfig::default());
    assert!(paths.contains(&"main.py".to_string()));
    assert!(paths.contains(&".github/workflows/ci.yml".to_string()));
    assert!(!paths.iter().any(|path| path == ".env"));
    assert!(!paths.iter().any(|path| path.starts_with(".hidden")));
}

#[test]
fn test_scan_is_deterministic() {
    let dir = tempdir().unwrap();
    write(dir.path(), "b.rs", "fn b() {}\n");
    write(dir.path(), "a.rs", "fn a() {}\n");
    write(dir.path(), "sub/c.rs", "fn c() {}\n");

    let first = scan(dir.path(), ScannerConfig::default());
    let second = scan(dir.path(), ScannerConfig::default());
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_entry_point_sorts_first() {
    let dir = tempdir().unwrap();
    write(dir.path(), "zz_util.py", "def util(): pass\n");
    write(dir.path(), "src/main.py", "def main(): pass\n");

    let paths = scan(dir.path(), ScannerConfig::default());
    assert_eq!(paths[0], "src/main.py");
}

#[test]
fn test_oversized_file_is_dropped() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big.rs", &"x".repeat(2048));
    write(dir.path(), "small.rs", "fn s() {}\n");

    let config = ScannerConfig {
        max_file_size: 1024,
        ..ScannerConfig::default()
    };
    let paths = scan(dir.path(), config);
    assert_eq!(paths, vec!["small.rs".to_string()]);
}

#[test]
fn test_binary_content_is_dropped_with_warning() {
    let dir = tempdir().unwrap();
    write(dir.path(), "ok.rs", "fn ok() {}\n");
    fs::write(dir.path().join("raw.rs"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let paths = scan(dir.path(), ScannerConfig::default());
    assert_eq!(paths, vec!["ok.rs".to_string()]);
}

#[test]
fn test_git_only_repository_scans_empty() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".git/HEAD", "ref: refs/heads/main\n");
    write(dir.path(), ".git/config", "[core]\n");

    let paths = scan(dir.path(), ScannerConfig::default());
    assert!(paths.is_empty());
}

#[test]
fn test_user_excludes_are_additive() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/a.rs", "fn a() {}\n");
    write(dir.path(), "generated/gen.rs", "fn gen() {}\n");
    write(dir.path(), "src/schema.gen.ts", "export const x = 1;\n");

    let config = ScannerConfig {
        excluded_dirs: vec!["generated".to_string()],
        excluded_files: vec!["*.gen.ts".to_string()],
        ..ScannerConfig::default()
    };
    let paths = scan(dir.path(), config);
    assert_eq!(paths, vec!["src/a.rs".to_string()]);
}

#[test]
fn test_classification_and_metadata() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "src/app.ts",
        "import { x } from './util';\nexport const value = x;\n",
    );
    write(dir.path(), "Dockerfile", "FROM rust:1.80\n");
    write(dir.path(), "docs/guide.md", "# Guide\n");
    write(dir.path(), "src/app.test.ts", "test('x', () => {});\n");

    let files = Scanner::new(ScannerConfig::default())
        .scan(dir.path(), &CancelToken::new())
        .unwrap();

    let by_path = |path: &str| files.iter().find(|f| f.relative_path == path).unwrap();

    let app = by_path("src/app.ts");
    assert_eq!(app.file_type, FileType::Code);
    assert_eq!(app.language.as_deref(), Some("typescript"));
    assert_eq!(app.imports, vec!["./util".to_string()]);
    assert_eq!(app.exports, vec!["value".to_string()]);
    assert_eq!(app.token_estimate, app.content.len().div_ceil(4));

    assert_eq!(by_path("Dockerfile").file_type, FileType::Build);
    assert_eq!(by_path("docs/guide.md").file_type, FileType::Doc);
    assert_eq!(by_path("src/app.test.ts").file_type, FileType::Test);
}

#[test]
fn test_cancellation_aborts_scan() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.rs", "fn a() {}\n");

    let cancel = CancelToken::new();
    cancel.cancel();

    let result = Scanner::new(ScannerConfig::default()).scan(dir.path(), &cancel);
    assert!(result.is_err());
}
