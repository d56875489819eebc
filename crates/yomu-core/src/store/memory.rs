//! In-memory store, used by tests and by hosts that persist elsewhere

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Collection, LocalStore};
use crate::{Error, Result};

type Records = BTreeMap<(Collection, String), Vec<u8>>;

/// `LocalStore` backed by an ordered map behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: Collection) -> Result<usize> {
        Ok(self
            .lock()?
            .keys()
            .filter(|(owner, _)| *owner == collection)
            .count())
    }

    /// Copy of every record, for whole-store comparisons.
    pub fn snapshot(&self) -> Result<Records> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }
}

impl LocalStore for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(&(collection, key.to_string())).cloned())
    }

    async fn set(&self, collection: Collection, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?
            .insert((collection, key.to_string()), value.to_vec());
        Ok(())
    }

    async fn remove(&self, collection: Collection, key: &str) -> Result<()> {
        self.lock()?.remove(&(collection, key.to_string()));
        Ok(())
    }

    async fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|(owner, _)| *owner == collection)
            .map(|(_, key)| key.clone())
            .collect())
    }
}
