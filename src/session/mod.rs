//! Session module - Conversation state per session identifier
//!
//! The `SessionManager` is the only mutable shared resource of the engine.
//! It hands out snapshots of a conversation (`load`) and accepts the whole
//! conversation back at turn end (`commit`), so a turn either lands in full
//! or not at all.
//!
//! # Example
//!
//! ```
//! use toolweave::session::{SessionManager, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new_memory();
//!
//!     let mut history = manager.load("web:42").await.unwrap();
//!     assert!(history.is_empty());
//!
//!     history.push(Message::user("Hello!"));
//!     history.push(Message::assistant("Hi there!"));
//!     manager.commit("web:42", history).await.unwrap();
//!
//!     assert_eq!(manager.load("web:42").await.unwrap().len(), 2);
//! }
//! ```

pub mod types;

pub use types::{validate_history, Message, Role, Session, ToolCall};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, WeaveError};

/// Session store keyed by session identifier.
///
/// Cloning is cheap; clones share the same underlying map.
///
/// # Persistence
///
/// `new_memory()` keeps sessions only in memory. `with_path()` additionally
/// mirrors every committed session to `<dir>/<encoded-key>.json`.
#[derive(Clone)]
pub struct SessionManager {
    /// In-memory cache of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Optional directory for file-based persistence
    storage_path: Option<PathBuf>,
}

impl SessionManager {
    /// Create an in-memory session manager without persistence.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
        }
    }

    /// Create a session manager that persists sessions under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
        })
    }

    /// Load the conversation for `key`.
    ///
    /// Unknown keys yield an empty history; nothing is created.
    pub async fn load(&self, key: &str) -> Result<Vec<Message>> {
        Ok(self
            .get(key)
            .await?
            .map(|s| s.messages)
            .unwrap_or_default())
    }

    /// Get a session by key without creating it.
    ///
    /// Sessions found on disk are cached in memory.
    pub async fn get(&self, key: &str) -> Result<Option<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return Ok(Some(session.clone()));
            }
        }

        if let Some(session) = self.read_from_disk(key).await? {
            let mut sessions = self.sessions.write().await;
            let cached = sessions
                .entry(key.to_string())
                .or_insert(session)
                .clone();
            return Ok(Some(cached));
        }

        Ok(None)
    }

    /// Get an existing session or create (and cache) an empty one.
    pub async fn get_or_create(&self, key: &str) -> Result<Session> {
        if let Some(session) = self.get(key).await? {
            return Ok(session);
        }
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .clone())
    }

    /// Replace the conversation for `key` with `messages`.
    ///
    /// The history is validated first; an invalid history leaves the stored
    /// conversation untouched. On disk the session is written to a temporary
    /// file and renamed over the previous one.
    pub async fn commit(&self, key: &str, messages: Vec<Message>) -> Result<()> {
        validate_history(&messages)?;

        let mut sessions = self.sessions.write().await;
        let mut session = match sessions.get(key) {
            Some(existing) => existing.clone(),
            None => self
                .read_from_disk(key)
                .await?
                .unwrap_or_else(|| Session::new(key)),
        };
        session.messages = messages;
        session.updated_at = Utc::now();

        // Disk first: if the write fails the in-memory copy stays as it was.
        self.write_to_disk(&session).await?;
        debug!(
            session = %key,
            messages = session.messages.len(),
            "Committed session"
        );
        sessions.insert(key.to_string(), session);
        Ok(())
    }

    /// Delete a session from both memory and disk.
    pub async fn delete(&self, key: &str) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(key);
        }

        if let Some(file_path) = self.file_path(key) {
            if file_path.exists() {
                tokio::fs::remove_file(&file_path).await?;
            }
        }

        Ok(())
    }

    /// List all session keys, from memory and disk, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions.keys().cloned().collect()
        };

        if let Some(ref storage_path) = self.storage_path {
            let mut dir_entries = tokio::fs::read_dir(storage_path).await?;
            while let Some(entry) = dir_entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    if let Ok(content) = tokio::fs::read_to_string(&path).await {
                        if let Ok(session) = serde_json::from_str::<Session>(&content) {
                            if !keys.contains(&session.key) {
                                keys.push(session.key);
                            }
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Check if a session exists in memory or on disk.
    pub async fn exists(&self, key: &str) -> bool {
        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(key) {
                return true;
            }
        }
        self.file_path(key).map(|p| p.exists()).unwrap_or(false)
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        self.storage_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", sanitize_key(key))))
    }

    async fn read_from_disk(&self, key: &str) -> Result<Option<Session>> {
        let Some(file_path) = self.file_path(key) else {
            return Ok(None);
        };
        if !file_path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&file_path).await?;
        let session: Session = serde_json::from_str(&content)
            .map_err(|e| WeaveError::Session(format!("corrupt session file for '{}': {}", key, e)))?;
        Ok(Some(session))
    }

    async fn write_to_disk(&self, session: &Session) -> Result<()> {
        let (Some(dir), Some(file_path)) = (self.storage_path.as_ref(), self.file_path(&session.key))
        else {
            return Ok(());
        };
        let tmp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&tmp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &file_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Percent-encode characters that are unsafe in filenames.
///
/// The mapping is one-to-one, so distinct keys never share a file.
fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 3);
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            '.' if result.is_empty() => result.push_str("%2E"),
            c => result.push(c),
        }
    }
    result
}
