//! History persistence - save and load the conversation blob
//!
//! One JSON file per history key under the data directory. Loaded once when a
//! panel starts, rewritten after every history mutation when enabled.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Conversation, Turn};
use crate::error::Result;

/// Saved history state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedHistory {
    pub id: String,
    pub key: String,
    pub turns: Vec<Turn>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Get the default state directory
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("panelchat"))
        .unwrap_or_else(|| PathBuf::from(".panelchat"))
        .join("state")
}

/// File-backed store for one history key
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    key: String,
    id: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl HistoryStore {
    /// Store `key` inside `dir`
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
            key: key.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Store `key` in the default state directory
    pub fn in_default_dir(key: &str) -> Self {
        Self::new(default_state_dir(), key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved conversation, if any
    pub fn load(&mut self) -> Result<Option<Conversation>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)?;
        let saved: SavedHistory = serde_json::from_str(&json)?;
        self.id = saved.id;
        self.created_at = saved.created_at;

        debug!(path = %self.path.display(), turns = saved.turns.len(), "Loaded history");
        Ok(Some(Conversation::from_turns(saved.turns)))
    }

    /// Write `conversation`, replacing the previous blob
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let saved = SavedHistory {
            id: self.id.clone(),
            key: self.key.clone(),
            turns: conversation.turns().to_vec(),
            created_at: self.created_at,
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string_pretty(&saved)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), turns = saved.turns.len(), "Saved history");
        Ok(())
    }
}
