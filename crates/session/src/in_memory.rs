//! In-memory session store, for tests and `--no-persist` runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{SessionError, SessionRecord, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    record: Mutex<SessionRecord>,
    saves: Mutex<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            record: Mutex::new(record),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful saves so far.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }

    pub async fn snapshot(&self) -> SessionRecord {
        self.record.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> SessionRecord {
        self.record.lock().await.clone()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        *self.record.lock().await = record.clone();
        *self.saves.lock().await += 1;
        Ok(())
    }
}
