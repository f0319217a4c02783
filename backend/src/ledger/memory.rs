//! In-process key-value backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

/// Map-backed store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, String>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        Ok(map.remove(key).is_some())
    }

    async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
