use std::collections::HashMap;

use super::KeyValueStore;
use crate::error::StoreError;

/// In-process document store.
///
/// An optional byte capacity makes writes fail with
/// [`StoreError::QuotaExceeded`] once the stored values would exceed it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    capacity_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            values: HashMap::new(),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    pub fn set_capacity_bytes(&mut self, capacity_bytes: Option<usize>) {
        self.capacity_bytes = capacity_bytes;
    }

    /// Bytes currently held across all values.
    pub fn used_bytes(&self) -> usize {
        self.values.values().map(String::len).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(capacity) = self.capacity_bytes {
            let replaced = self.values.get(key).map_or(0, String::len);
            if self.used_bytes() - replaced + value.len() > capacity {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}
