//! File-backed key-value store.
//!
//! Keeps the whole map in memory and rewrites a single JSON snapshot after
//! every mutation. Meant for the CLI and small single-process deployments.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

/// Default snapshot location (relative to current dir)
pub const DEFAULT_STORE_PATH: &str = ".payout/addresses.json";

/// JSON snapshot store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, String>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("file store lock poisoned".to_string())
}

impl FileStore {
    /// Open a snapshot, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = PathBuf::from(path.as_ref());
        let map = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        // Atomic replace.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        // Memory only changes once the snapshot is on disk
        let mut next = map.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        if !map.contains_key(key) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.remove(key);
        self.persist(&next)?;
        *map = next;
        Ok(true)
    }

    async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
