//! Conversation persistence for codeclaw.
//!
//! A session is the ordered message history plus the session token
//! counters. It is saved after every run and on shutdown, and loaded once
//! at startup. A missing or unreadable session starts empty.

pub mod file;
pub mod in_memory;

use async_trait::async_trait;
use codeclaw_core::{Message, TokenUsage};
use serde::{Deserialize, Serialize};

pub use file::FileSessionStore;
pub use in_memory::InMemorySessionStore;

/// What gets persisted between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Conversation history in turn order
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub usage: TokenUsage,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session I/O failed: {0}")]
    Io(String),

    #[error("Session serialization failed: {0}")]
    Serialization(String),
}

/// Where sessions are loaded from and saved to.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the saved session. Failures are logged and yield an empty record.
    async fn load(&self) -> SessionRecord;

    /// Replace the saved session.
    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;
}
