//! Activation checkpoint storage
//!
//! The registration workflow keeps exactly two flags per card: whether
//! activation has been started, and whether the registration transactions
//! were already submitted. The second flag makes the workflow resumable after
//! a process restart without double-submitting the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-card activation flags
pub trait ActivationStorage: Send + Sync {
    fn activation_started(&self, card_id: &str) -> bool;
    fn set_activation_started(&self, card_id: &str) -> Result<()>;

    fn transactions_sent(&self, card_id: &str) -> bool;
    fn set_transactions_sent(&self, card_id: &str, sent: bool) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageState {
    #[serde(default)]
    started: HashSet<String>,
    #[serde(default)]
    transactions_sent: HashSet<String>,
}

fn read_guard(lock: &RwLock<StorageState>) -> RwLockReadGuard<'_, StorageState> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("activation storage lock poisoned");
        poisoned.into_inner()
    })
}

fn write_guard(lock: &RwLock<StorageState>) -> RwLockWriteGuard<'_, StorageState> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("activation storage lock poisoned");
        poisoned.into_inner()
    })
}

/// JSON-file-backed activation storage
pub struct FileActivationStorage {
    path: PathBuf,
    state: RwLock<StorageState>,
}

impl FileActivationStorage {
    /// Open or create the storage file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StorageState::default(),
            Err(err) => return Err(Error::Io(err)),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn persist(&self, state: &StorageState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

}

impl ActivationStorage for FileActivationStorage {
    fn activation_started(&self, card_id: &str) -> bool {
        read_guard(&self.state).started.contains(card_id)
    }

    fn set_activation_started(&self, card_id: &str) -> Result<()> {
        let mut state = write_guard(&self.state);
        state.started.insert(card_id.to_string());
        self.persist(&state)
    }

    fn transactions_sent(&self, card_id: &str) -> bool {
        read_guard(&self.state).transactions_sent.contains(card_id)
    }

    fn set_transactions_sent(&self, card_id: &str, sent: bool) -> Result<()> {
        let mut state = write_guard(&self.state);
        if sent {
            state.transactions_sent.insert(card_id.to_string());
        } else {
            state.transactions_sent.remove(card_id);
        }
        self.persist(&state)
    }
}

/// In-memory activation storage for tests and stubs
#[derive(Default)]
pub struct MemoryActivationStorage {
    state: RwLock<StorageState>,
}

impl MemoryActivationStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivationStorage for MemoryActivationStorage {
    fn activation_started(&self, card_id: &str) -> bool {
        read_guard(&self.state).started.contains(card_id)
    }

    fn set_activation_started(&self, card_id: &str) -> Result<()> {
        write_guard(&self.state).started.insert(card_id.to_string());
        Ok(())
    }

    fn transactions_sent(&self, card_id: &str) -> bool {
        read_guard(&self.state).transactions_sent.contains(card_id)
    }

    fn set_transactions_sent(&self, card_id: &str, sent: bool) -> Result<()> {
        let mut state = write_guard(&self.state);
        if sent {
            state.transactions_sent.insert(card_id.to_string());
        } else {
            state.transactions_sent.remove(card_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_flags() {
        let storage = MemoryActivationStorage::new();
        assert!(!storage.activation_started("CB79"));
        assert!(!storage.transactions_sent("CB79"));

        storage.set_activation_started("CB79").unwrap();
        storage.set_transactions_sent("CB79", true).unwrap();
        assert!(storage.activation_started("CB79"));
        assert!(storage.transactions_sent("CB79"));

        storage.set_transactions_sent("CB79", false).unwrap();
        assert!(!storage.transactions_sent("CB79"));
    }

    #[test]
    fn test_memory_storage_survives_poisoned_lock() {
        use std::sync::Arc;

        let storage = Arc::new(MemoryActivationStorage::new());
        storage.set_transactions_sent("CB79", true).unwrap();

        let poisoner = Arc::clone(&storage);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(storage.transactions_sent("CB79"));
        storage.set_transactions_sent("CB79", false).unwrap();
        assert!(!storage.transactions_sent("CB79"));
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activation.json");

        {
            let storage = FileActivationStorage::open(&path).unwrap();
            storage.set_activation_started("CB79").unwrap();
            storage.set_transactions_sent("CB79", true).unwrap();
        }

        let storage = FileActivationStorage::open(&path).unwrap();
        assert!(storage.activation_started("CB79"));
        assert!(storage.transactions_sent("CB79"));
        assert!(!storage.transactions_sent("OTHER"));
    }
}
