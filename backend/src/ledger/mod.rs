//! Composite-key ledger.
//!
//! A small key-value abstraction with three interchangeable backends:
//!
//! - [`MemoryStore`] - process-local map
//! - [`FileStore`] - JSON snapshot on disk
//! - [`RemoteStore`] - Redis-compatible REST endpoint
//!
//! Keys are built from ordered parts with [`encode_key`]; higher-level
//! queries live in [`AddressRegistry`] and work by scanning [`KvStore::entries`].

pub mod file;
pub mod memory;
pub mod registry;
pub mod remote;

use std::future::Future;

use crate::error::{KeyError, StoreResult};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use registry::AddressRegistry;
pub use remote::RemoteStore;

/// Separator between key parts. Never allowed inside a part.
pub const KEY_DELIMITER: char = '!';

/// Join key parts with [`KEY_DELIMITER`].
///
/// Rejects empty parts and parts containing the delimiter so that
/// `decode_key(encode_key(parts)) == parts` always holds.
pub fn encode_key<S: AsRef<str>>(parts: &[S]) -> Result<String, KeyError> {
    if parts.is_empty() {
        return Err(KeyError::NoParts);
    }

    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        let part = part.as_ref();
        if part.is_empty() {
            return Err(KeyError::EmptyPart(i));
        }
        if part.contains(KEY_DELIMITER) {
            return Err(KeyError::ReservedDelimiter {
                part: part.to_string(),
                delimiter: KEY_DELIMITER,
            });
        }
        if i > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(part);
    }
    Ok(key)
}

/// Split a key produced by [`encode_key`] back into its parts.
pub fn decode_key(key: &str) -> Vec<String> {
    key.split(KEY_DELIMITER).map(str::to_string).collect()
}

/// Asynchronous key-value store.
///
/// Absence is a value (`None` / `false`), never an error. `entries` is a
/// full scan taken fresh on every call.
pub trait KvStore: Send + Sync {
    fn set(&self, key: &str, value: &str) -> impl Future<Output = StoreResult<()>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Returns whether a value was removed.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn entries(&self) -> impl Future<Output = StoreResult<Vec<(String, String)>>> + Send;
}

/// Backend chosen at runtime from configuration.
#[derive(Debug)]
pub enum AnyStore {
    Memory(MemoryStore),
    File(FileStore),
    Remote(RemoteStore),
}

impl AnyStore {
    pub fn kind(&self) -> &'static str {
        match self {
            AnyStore::Memory(_) => "memory",
            AnyStore::File(_) => "file",
            AnyStore::Remote(_) => "remote",
        }
    }
}

impl KvStore for AnyStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        match self {
            AnyStore::Memory(s) => s.set(key, value).await,
            AnyStore::File(s) => s.set(key, value).await,
            AnyStore::Remote(s) => s.set(key, value).await,
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            AnyStore::Memory(s) => s.get(key).await,
            AnyStore::File(s) => s.get(key).await,
            AnyStore::Remote(s) => s.get(key).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match self {
            AnyStore::Memory(s) => s.delete(key).await,
            AnyStore::File(s) => s.delete(key).await,
            AnyStore::Remote(s) => s.delete(key).await,
        }
    }

    async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        match self {
            AnyStore::Memory(s) => s.entries().await,
            AnyStore::File(s) => s.entries().await,
            AnyStore::Remote(s) => s.entries().await,
        }
    }
}
