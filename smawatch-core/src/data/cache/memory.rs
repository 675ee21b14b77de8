//! In-process backend. Clones share the same map.

use super::{CacheBackend, CacheEntry};
use crate::data::provider::DataError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<BTreeMap<String, CacheEntry>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, CacheEntry>>, DataError> {
        self.entries
            .lock()
            .map_err(|_| DataError::CacheBackend("memory cache lock poisoned".into()))
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>, DataError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), DataError> {
        self.lock()?.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DataError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, DataError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
