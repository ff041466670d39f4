//! # Storage Module - Key-Value Persistence
//!
//! The gateway core only needs "blob get/set" from its persistent store: the
//! delivery queue snapshot lives under a handful of flat keys. This module defines
//! that capability as [`KvStore`] and ships two implementations:
//!
//! - [`SledStore`] - sled tree under the configured data directory
//! - [`MemoryStore`] - in-process map, used when the data directory is unusable and in tests
//!
//! ## Layout
//!
//! ```text
//! data/
//! └── kv/            ← sled database, tree "gateway"
//!     buf_count      ← number of persisted queue entries
//!     topic_<i>      ← entry topic (UTF-8)
//!     data_<i>       ← entry payload bytes
//!     ts_<i>         ← enqueue timestamp, decimal ms
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rfidgate::storage::{KvStore, SledStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = SledStore::open("./data/kv")?;
//!     store.set("buf_count", b"0")?;
//!     assert_eq!(store.get("buf_count")?, Some(b"0".to_vec()));
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::errors::StoreError;

const TREE_GATEWAY: &str = "gateway";

/// Blob get/set capability.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// Make previous writes durable. Default is a no-op for volatile stores.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Sled-backed persistence.
pub struct SledStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let tree = db.open_tree(TREE_GATEWAY)?;
        Ok(Self { _db: db, tree })
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }
}

/// Read a decimal number stored as UTF-8 text.
pub fn get_u64(store: &dyn KvStore, key: &str) -> Result<Option<u64>, StoreError> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(key.to_string())),
    }
}

pub fn set_u64(store: &dyn KvStore, key: &str, value: u64) -> Result<(), StoreError> {
    store.set(key, value.to_string().as_bytes())
}
