//! In-memory reference implementation of the backing store.
//!
//! [`MemStore`] keeps everything in a [`BTreeMap`] behind a [`RwLock`]; the
//! map's ordering gives `keys()` its ascending order for free. It is intended
//! for tests, tooling, and as the reference implementation of the [`KvStore`]
//! contract; persistent deployments plug in a database-backed store instead.
use std::{collections::BTreeMap, sync::RwLock};

use crate::kv::KvStore;

/// Thread-safe in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clone for MemStore {
    fn clone(&self) -> Self {
        Self {
            entries: RwLock::new(self.entries.read().expect("store lock poisoned").clone()),
        }
    }
}

impl KvStore for MemStore {
    fn set(&self, key: &[u8], value: &[u8]) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_vec(), value.to_vec());
    }

    fn del(&self, key: &[u8]) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .remove(key);
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn has(&self, key: &[u8]) -> bool {
        self.entries
            .read()
            .expect("store lock poisoned")
            .contains_key(key)
    }

    fn keys(&self) -> Vec<Vec<u8>> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.read().expect("store lock poisoned").len()
    }
}
