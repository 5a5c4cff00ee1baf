//! Disk-backed conversation sessions with bounded history

use crate::config::ConversationConfig;
use crate::error::Result;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One message in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// File paths the assistant grounded this message in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Project tags the message relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

/// One conversation session; persists as a single JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ConversationSession {
    fn new(title: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }
}

/// In-memory session map with write-through persistence.
///
/// Mutation is synchronous; each mutation writes the session file
/// best-effort, and a failed write never fails the caller.
pub struct ConversationStore {
    dir: PathBuf,
    sessions: HashMap<String, ConversationSession>,
    current: Option<String>,
    max_history_length: usize,
}

impl ConversationStore {
    /// Open a store over a sessions directory, loading any existing files.
    ///
    /// Files that fail to parse are skipped.
    pub fn open(dir: impl Into<PathBuf>, config: &ConversationConfig) -> Self {
        let dir = dir.into();
        let mut sessions = HashMap::new();

        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|content| {
                        serde_json::from_str::<ConversationSession>(&content)
                            .map_err(|e| e.to_string())
                    }) {
                    Ok(session) => {
                        sessions.insert(session.id.clone(), session);
                    }
                    Err(e) => {
                        warn!("Skipping unreadable session file {}: {}", path.display(), e);
                    }
                }
            }
        }

        info!("Loaded {} conversation sessions", sessions.len());

        Self {
            dir,
            sessions,
            current: None,
            max_history_length: config.max_history_length,
        }
    }

    /// Create a session and make it current
    pub fn create_session(&mut self, title: impl Into<String>) -> String {
        let session = ConversationSession::new(title.into());
        let id = session.id.clone();
        debug!("Created session {}", id);
        self.sessions.insert(id.clone(), session);
        self.current = Some(id.clone());
        self.persist(&id);
        id
    }

    /// Append a message to the current session, creating one titled from
    /// the local timestamp if none is active. The oldest messages are
    /// dropped once the history bound is exceeded.
    pub fn add_message(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        sources: Option<Vec<String>>,
    ) -> String {
        let session_id = match self.current.clone() {
            Some(id) if self.sessions.contains_key(&id) => id,
            _ => self.create_session(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        };

        let message = ConversationMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            sources,
            projects: None,
        };
        let message_id = message.id.clone();

        let max_history_length = self.max_history_length;
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.messages.push(message);
            while session.messages.len() > max_history_length {
                session.messages.remove(0);
            }
            session.updated_at = Utc::now();
        }

        self.persist(&session_id);
        message_id
    }

    /// The active session id, if any
    pub fn current_session(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Switch the active session; unknown ids are rejected
    pub fn set_current(&mut self, id: &str) -> bool {
        if self.sessions.contains_key(id) {
            self.current = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Look up a session
    pub fn get(&self, id: &str) -> Option<&ConversationSession> {
        self.sessions.get(id)
    }

    /// The last `n` messages of the current session, oldest first
    pub fn recent_messages(&self, n: usize) -> Vec<&ConversationMessage> {
        let Some(session) = self.current.as_ref().and_then(|id| self.sessions.get(id)) else {
            return Vec::new();
        };
        let skip = session.messages.len().saturating_sub(n);
        session.messages.iter().skip(skip).collect()
    }

    /// All sessions, most recently updated first
    pub fn list(&self) -> Vec<&ConversationSession> {
        let mut sessions: Vec<&ConversationSession> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Deep copy of a session for export
    pub fn export_session(&self, id: &str) -> Option<ConversationSession> {
        self.sessions.get(id).cloned()
    }

    /// Import a session, regenerating its id on collision
    pub fn import_session(&mut self, mut session: ConversationSession) -> String {
        if self.sessions.contains_key(&session.id) {
            let fresh = uuid::Uuid::new_v4().to_string();
            debug!("Imported session id collides, reassigning to {}", fresh);
            session.id = fresh;
        }
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.persist(&id);
        id
    }

    /// Delete a session and its file
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            if self.current.as_deref() == Some(id) {
                self.current = None;
            }
            let path = self.session_path(id);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            info!("Deleted session {}", id);
        }
        Ok(())
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Fire-and-forget write-through; failures log and are swallowed
    fn persist(&self, id: &str) {
        let Some(session) = self.sessions.get(id) else {
            return;
        };
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(session).map_err(|e| e.to_string()))
            .and_then(|content| {
                std::fs::write(self.session_path(id), content).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("Failed to persist session {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> ConversationStore {
        ConversationStore::open(dir, &ConversationConfig::default())
    }

    #[test]
    fn test_implicit_session_creation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        assert!(store.current_session().is_none());
        store.add_message(MessageRole::User, "hello", None);

        let id = store.current_session().unwrap().to_string();
        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 1);
        // Implicit titles come from the local timestamp.
        assert!(session.title.contains('-'));
    }

    #[test]
    fn test_history_bound_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversationConfig {
            max_history_length: 3,
        };
        let mut store = ConversationStore::open(dir.path(), &config);

        for i in 0..5 {
            store.add_message(MessageRole::User, format!("message {}", i), None);
        }

        let id = store.current_session().unwrap().to_string();
        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 3);
        // The tail is preserved.
        assert_eq!(session.messages[0].content, "message 2");
        assert_eq!(session.messages[2].content, "message 4");
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let id = {
            let mut store = store(dir.path());
            store.create_session("research");
            store.add_message(
                MessageRole::Assistant,
                "answer",
                Some(vec!["src/main.rs".to_string()]),
            );
            store.current_session().unwrap().to_string()
        };

        let reloaded = store(dir.path());
        let session = reloaded.get(&id).unwrap();
        assert_eq!(session.title, "research");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(
            session.messages[0].sources.as_ref().unwrap()[0],
            "src/main.rs"
        );
    }

    #[test]
    fn test_unparseable_session_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();

        let store = store(dir.path());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_import_regenerates_colliding_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let id = store.create_session("original");
        let exported = store.export_session(&id).unwrap();

        let imported_id = store.import_session(exported);
        assert_ne!(imported_id, id);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_recent_messages_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        for i in 0..6 {
            store.add_message(MessageRole::User, format!("m{}", i), None);
        }
        let recent = store.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m4");
        assert_eq!(recent[1].content, "m5");
    }

    #[test]
    fn test_delete_session_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let id = store.create_session("temp");
        assert!(dir.path().join(format!("{}.json", id)).exists());

        store.delete_session(&id).unwrap();
        assert!(store.get(&id).is_none());
        assert!(!dir.path().join(format!("{}.json", id)).exists());
    }
}
