//! Durable snapshot storage.
//!
//! The persisted snapshot is a single mutable record exclusively owned by
//! the session machine: written on every mutation, read once at start-up.
//! A save must be durable before control returns to the caller.

use std::sync::Mutex;

use crate::error::StorageError;
use crate::session::PersistedSnapshot;

pub trait SnapshotStore: Send {
    fn load_snapshot(&self) -> Result<Option<PersistedSnapshot>, StorageError>;
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError>;
    fn clear_snapshot(&self) -> Result<(), StorageError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<PersistedSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_snapshot(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        let inner = self.inner.lock().map_err(|_| StorageError::Locked)?;
        Ok(inner.clone())
    }

    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Locked)?;
        *inner = Some(snapshot.clone());
        Ok(())
    }

    fn clear_snapshot(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Locked)?;
        *inner = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSettings, SessionState};

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load_snapshot().unwrap().is_none());

        let snap = PersistedSnapshot {
            state: SessionState::initial(&SessionSettings::default()),
            settings: SessionSettings::default(),
            saved_at_epoch_ms: Some(123),
            manual_pause: false,
            hidden_at_epoch_ms: None,
        };
        store.save_snapshot(&snap).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), Some(snap));

        store.clear_snapshot().unwrap();
        assert!(store.load_snapshot().unwrap().is_none());
    }
}
