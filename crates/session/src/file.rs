//! JSON file session store.
//!
//! The whole record is rewritten on every save through a temporary file
//! and a rename, so a crash mid-write leaves the previous session intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{SessionError, SessionRecord, SessionStore};

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> SessionRecord {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved session, starting empty");
                return SessionRecord::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session, starting empty");
                return SessionRecord::default();
            }
        };

        match serde_json::from_str::<SessionRecord>(&content) {
            Ok(record) => {
                debug!(path = %self.path.display(), messages = record.messages.len(), "Session loaded");
                record
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupted session file, starting empty");
                SessionRecord::default()
            }
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Io(format!("Failed to create session directory: {e}")))?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SessionError::Io(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SessionError::Io(format!("Failed to replace session file: {e}")))?;

        debug!(path = %self.path.display(), messages = record.messages.len(), "Session saved");
        Ok(())
    }
}
