use std::collections::HashMap;

use parking_lot::RwLock;

use super::{SessionStorage, StorageError};

/// In-process storage. Writes can be rejected to simulate a full or
/// disabled backing store; removals still succeed in that mode.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: RwLock<Option<usize>>,
    reject_writes: RwLock<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the size of a single value
    pub fn with_quota(quota_bytes: usize) -> Self {
        let storage = Self::default();
        *storage.quota_bytes.write() = Some(quota_bytes);
        storage
    }

    pub fn set_reject_writes(&self, reject: bool) {
        *self.reject_writes.write() = reject;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if *self.reject_writes.read() {
            return Err(StorageError::Unavailable("writes are disabled".to_string()));
        }
        if let Some(quota) = *self.quota_bytes.read() {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    bytes: value.len(),
                });
            }
        }
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
