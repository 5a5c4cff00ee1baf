//! Per-repository cache directories and the global cache index
//!
//! Every failure on the read path degrades to a cache-miss; the pipeline
//! treats a miss as "rebuild", never as an error. Writes are best-effort.

use crate::analyzer::ProjectAnalysis;
use crate::embedding::EmbedderFingerprint;
use crate::error::Result;
use crate::store::{IndexSnapshot, SNAPSHOT_VERSION};
use crate::wiki::WikiData;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cache schema version; any other value is a miss, never a migration
pub const CACHE_VERSION: &str = "1.0.0";

/// Name of the per-repository cache directory
pub const CACHE_DIR_NAME: &str = ".deepwiki";

/// Snapshots older than this are invalid
const CACHE_TTL_DAYS: i64 = 7;

/// Maximum repositories tracked in the global index
const GLOBAL_MAX_ENTRIES: usize = 10;

/// Global cleanup runs at most this often
const CLEANUP_INTERVAL_DAYS: i64 = 1;

/// Envelope around the cached wiki
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiCacheFile {
    version: String,
    wiki_data: WikiData,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

/// Envelope around the cached analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisCacheFile {
    version: String,
    analysis_result: ProjectAnalysis,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

/// One repository tracked by the global index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIndexEntry {
    pub project_path: String,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: String,
}

/// Process-wide index over all cached repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIndex {
    pub version: String,
    pub entries: Vec<GlobalIndexEntry>,
    pub last_cleanup: DateTime<Utc>,
}

impl Default for GlobalIndex {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            entries: Vec::new(),
            last_cleanup: Utc::now(),
        }
    }
}

/// Handle to one repository's cache directory plus the global index
pub struct IndexCache {
    repo_root: PathBuf,
    global_index_path: PathBuf,
}

impl IndexCache {
    /// Cache handle for a repository, using the OS data directory for the
    /// global index
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            global_index_path: default_global_index_path(),
        }
    }

    /// Override the global index location (used by tests)
    pub fn with_global_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_index_path = path.into();
        self
    }

    /// The `.deepwiki` directory of this repository
    pub fn cache_dir(&self) -> PathBuf {
        self.repo_root.join(CACHE_DIR_NAME)
    }

    fn vectors_path(&self) -> PathBuf {
        self.cache_dir().join("cache").join("vectors.json")
    }

    fn wiki_path(&self) -> PathBuf {
        self.cache_dir().join("wiki-cache.json")
    }

    fn analysis_path(&self) -> PathBuf {
        self.cache_dir().join("analysis-cache.json")
    }

    /// Directory holding one JSON file per conversation session
    pub fn conversations_dir(&self) -> PathBuf {
        self.cache_dir().join("conversations")
    }

    /// Load the vector snapshot if it is valid for the given embedder.
    ///
    /// Version mismatch, expiry and fingerprint mismatch are all misses.
    pub fn load_vector_snapshot(
        &self,
        fingerprint: &EmbedderFingerprint,
    ) -> Option<IndexSnapshot> {
        let snapshot: IndexSnapshot = read_json(&self.vectors_path())?;

        if snapshot.version != SNAPSHOT_VERSION {
            debug!(
                "Vector snapshot version {} != {}, cache miss",
                snapshot.version, SNAPSHOT_VERSION
            );
            return None;
        }
        if is_expired(snapshot.created_at) {
            debug!("Vector snapshot expired, cache miss");
            return None;
        }
        if snapshot.embedder_fingerprint != *fingerprint {
            debug!(
                "Embedder fingerprint {} != {}, cache miss",
                snapshot.embedder_fingerprint, fingerprint
            );
            return None;
        }

        Some(snapshot)
    }

    /// Persist the vector snapshot
    pub fn save_vector_snapshot(&self, snapshot: &IndexSnapshot) -> Result<()> {
        write_json(&self.vectors_path(), snapshot)
    }

    /// Load the cached wiki if valid
    pub fn load_wiki(&self) -> Option<WikiData> {
        let cached: WikiCacheFile = read_json(&self.wiki_path())?;
        if cached.version != CACHE_VERSION || is_expired(cached.created_at) {
            debug!("Wiki cache invalid, cache miss");
            return None;
        }
        Some(cached.wiki_data)
    }

    /// Persist the wiki
    pub fn save_wiki(&self, wiki: &WikiData) -> Result<()> {
        let now = Utc::now();
        write_json(
            &self.wiki_path(),
            &WikiCacheFile {
                version: CACHE_VERSION.to_string(),
                wiki_data: wiki.clone(),
                created_at: now,
                last_modified: now,
            },
        )
    }

    /// Load the cached analysis if valid
    pub fn load_analysis(&self) -> Option<ProjectAnalysis> {
        let cached: AnalysisCacheFile = read_json(&self.analysis_path())?;
        if cached.version != CACHE_VERSION || is_expired(cached.created_at) {
            debug!("Analysis cache invalid, cache miss");
            return None;
        }
        Some(cached.analysis_result)
    }

    /// Persist the analysis
    pub fn save_analysis(&self, analysis: &ProjectAnalysis) -> Result<()> {
        let now = Utc::now();
        write_json(
            &self.analysis_path(),
            &AnalysisCacheFile {
                version: CACHE_VERSION.to_string(),
                analysis_result: analysis.clone(),
                created_at: now,
                last_modified: now,
            },
        )
    }

    /// Delete this repository's cache directory and its global entry
    pub fn clear(&self) -> Result<()> {
        let dir = self.cache_dir();
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            info!("Cleared cache directory {}", dir.display());
        }

        let mut index = self.load_global_index();
        let repo = self.repo_root.to_string_lossy().into_owned();
        index.entries.retain(|entry| entry.project_path != repo);
        self.write_global_index(&index)
    }

    /// Record a successful build in the global index, enforcing the entry
    /// cap and periodic cleanup.
    pub fn record_build(&self, project_name: &str) -> Result<()> {
        let mut index = self.load_global_index();
        let now = Utc::now();
        let repo = self.repo_root.to_string_lossy().into_owned();

        match index
            .entries
            .iter_mut()
            .find(|entry| entry.project_path == repo)
        {
            Some(entry) => {
                entry.last_modified = now;
                entry.project_name = project_name.to_string();
                entry.version = CACHE_VERSION.to_string();
            }
            None => index.entries.push(GlobalIndexEntry {
                project_path: repo,
                project_name: project_name.to_string(),
                created_at: now,
                last_modified: now,
                version: CACHE_VERSION.to_string(),
            }),
        }

        // Oldest entries beyond the cap lose their cache directories.
        index
            .entries
            .sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        while index.entries.len() > GLOBAL_MAX_ENTRIES {
            if let Some(dropped) = index.entries.pop() {
                info!("Evicting cached repository {}", dropped.project_path);
                remove_repo_cache(&dropped.project_path);
            }
        }

        if now.signed_duration_since(index.last_cleanup)
            > Duration::days(CLEANUP_INTERVAL_DAYS)
        {
            index.entries.retain(|entry| {
                let expired = is_expired(entry.last_modified);
                if expired {
                    info!("Cleaning up expired cache for {}", entry.project_path);
                    remove_repo_cache(&entry.project_path);
                }
                !expired
            });
            index.last_cleanup = now;
        }

        self.write_global_index(&index)
    }

    /// Read the global index, defaulting on any failure
    pub fn load_global_index(&self) -> GlobalIndex {
        read_json(&self.global_index_path).unwrap_or_default()
    }

    fn write_global_index(&self, index: &GlobalIndex) -> Result<()> {
        write_json(&self.global_index_path, index)
    }
}

/// OS-appropriate location of the global cache index
pub fn default_global_index_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("repowiki")
        .join("index.json")
}

fn is_expired(created_at: DateTime<Utc>) -> bool {
    Utc::now().signed_duration_since(created_at) > Duration::days(CACHE_TTL_DAYS)
}

fn remove_repo_cache(project_path: &str) {
    let dir = Path::new(project_path).join(CACHE_DIR_NAME);
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            warn!("Failed to remove {}: {}", dir.display(), e);
        }
    }
}

/// Read and parse a JSON file; any failure is a miss
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return None,
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Unparseable cache file {}: {}", path.display(), e);
            None
        }
    }
}

/// Write JSON via a temp file and rename, so readers never see a torn write
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreStats;

    fn fingerprint(dimensions: usize) -> EmbedderFingerprint {
        EmbedderFingerprint {
            provider: "local".to_string(),
            model: "tfidf".to_string(),
            dimensions,
        }
    }

    fn snapshot(dimensions: usize) -> IndexSnapshot {
        IndexSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            embedder_fingerprint: fingerprint(dimensions),
            content_hash: "hash".to_string(),
            stats: StoreStats {
                total_documents: 0,
                dimensions,
            },
            documents: Vec::new(),
        }
    }

    fn cache_in(dir: &Path) -> IndexCache {
        IndexCache::new(dir).with_global_index_path(dir.join("global-index.json"))
    }

    #[test]
    fn test_missing_directory_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(cache.load_vector_snapshot(&fingerprint(256)).is_none());
        assert!(cache.load_wiki().is_none());
        assert!(cache.load_analysis().is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let saved = snapshot(256);
        cache.save_vector_snapshot(&saved).unwrap();

        let loaded = cache.load_vector_snapshot(&fingerprint(256)).unwrap();
        assert_eq!(loaded.content_hash, saved.content_hash);
        assert_eq!(loaded.stats, saved.stats);
    }

    #[test]
    fn test_fingerprint_mismatch_is_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.save_vector_snapshot(&snapshot(256)).unwrap();
        assert!(cache.load_vector_snapshot(&fingerprint(512)).is_none());
    }

    #[test]
    fn test_version_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let mut stale = snapshot(256);
        stale.version = "0.9.0".to_string();
        cache.save_vector_snapshot(&stale).unwrap();
        assert!(cache.load_vector_snapshot(&fingerprint(256)).is_none());
    }

    #[test]
    fn test_expired_snapshot_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let mut old = snapshot(256);
        old.created_at = Utc::now() - Duration::days(8);
        cache.save_vector_snapshot(&old).unwrap();
        assert!(cache.load_vector_snapshot(&fingerprint(256)).is_none());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let path = dir.path().join(CACHE_DIR_NAME).join("cache");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("vectors.json"), "{not json").unwrap();
        assert!(cache.load_vector_snapshot(&fingerprint(256)).is_none());
    }

    #[test]
    fn test_global_index_caps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global-index.json");

        for i in 0..12 {
            let repo = dir.path().join(format!("repo-{}", i));
            std::fs::create_dir_all(&repo).unwrap();
            let cache = IndexCache::new(&repo).with_global_index_path(&global);
            cache.record_build(&format!("repo-{}", i)).unwrap();
        }

        let last = IndexCache::new(dir.path().join("repo-11"))
            .with_global_index_path(&global);
        let index = last.load_global_index();
        assert_eq!(index.entries.len(), 10);
        // The newest entries survive.
        assert!(index
            .entries
            .iter()
            .any(|entry| entry.project_name == "repo-11"));
        assert!(!index
            .entries
            .iter()
            .any(|entry| entry.project_name == "repo-0"));
    }

    #[test]
    fn test_clear_removes_directory_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.save_vector_snapshot(&snapshot(256)).unwrap();
        cache.record_build("demo").unwrap();
        assert!(cache.cache_dir().exists());

        cache.clear().unwrap();
        assert!(!cache.cache_dir().exists());
        assert!(cache.load_global_index().entries.is_empty());
    }
}
