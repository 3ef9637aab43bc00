//! Bounded conversation persistence
//!
//! The conversation lives in a single JSON file, rewritten whole on every
//! save and truncated to the most recent N instructions. The server wraps
//! the store in a mutex so concurrent sessions serialize their
//! read-modify-write cycles.

use std::path::PathBuf;
use tracing::warn;

use crate::context::Instruction;
use crate::error::{LyraError, Result};

/// Append-and-truncate conversation store backed by one JSON file
pub struct MemoryStore {
    path: PathBuf,
    cap: usize,
}

impl MemoryStore {
    /// Create a store for the given file, retaining at most `cap` entries
    pub fn new(path: PathBuf, cap: usize) -> Self {
        Self { path, cap }
    }

    /// Load the persisted conversation
    ///
    /// A missing, unreadable or corrupt file yields an empty conversation,
    /// never an error.
    pub async fn load(&self) -> Vec<Instruction> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_slice(&bytes) {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(
                    "corrupt conversation file {}, starting fresh: {e}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Persist the conversation, truncated to the most recent `cap` entries
    ///
    /// Oldest entries are evicted first. The parent directory is created on
    /// demand.
    pub async fn save(&self, conversation: &[Instruction]) -> Result<()> {
        let start = conversation.len().saturating_sub(self.cap);
        let recent = &conversation[start..];

        let json = serde_json::to_vec_pretty(recent)
            .map_err(|e| LyraError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LyraError::Store(format!(
                    "failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| LyraError::Store(format!("failed to write {}: {e}", self.path.display())))
    }
}
