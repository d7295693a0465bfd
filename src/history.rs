use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

/// Persisted history keeps only the most recent messages; older entries are
/// dropped on every save.
pub const HISTORY_LIMIT: usize = 40;

/// A single entry in the conversation, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// File-backed store for the chat transcript.
///
/// The whole transcript is one JSON payload under a fixed path. Loading is
/// lenient: a missing file or unparseable content yields an empty history.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open() -> Result<Self> {
        Ok(Self { path: Self::default_path()? })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Vec<ChatMessage> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Write the trailing `HISTORY_LIMIT` messages, replacing prior content.
    pub fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let start = messages.len().saturating_sub(HISTORY_LIMIT);
        let payload = serde_json::to_string(&messages[start..])?;
        fs::write(&self.path, payload)?;
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("jarvis").join("history.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage { role, content: content.to_string() }
    }

    #[test]
    fn round_trips_saved_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));

        let messages = vec![
            message(ChatRole::User, "Hello"),
            message(ChatRole::Assistant, "Hi there"),
        ];
        store.save(&messages).unwrap();

        assert_eq!(store.load(), messages);
    }

    #[test]
    fn save_keeps_only_the_trailing_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));

        // 45 exchanges, 90 messages total
        let mut messages = Vec::new();
        for i in 0..45 {
            messages.push(message(ChatRole::User, &format!("question {}", i)));
            messages.push(message(ChatRole::Assistant, &format!("answer {}", i)));
        }
        store.save(&messages).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), HISTORY_LIMIT);
        assert_eq!(loaded, messages[messages.len() - HISTORY_LIMIT..]);
        assert_eq!(loaded[0].content, "question 25");
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("nope.json"));

        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = HistoryStore::at(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("deep/nested/history.json"));

        store.save(&[message(ChatRole::User, "hi")]).unwrap();
        assert_eq!(store.load().len(), 1);
    }
}
