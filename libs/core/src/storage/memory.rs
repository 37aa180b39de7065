use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use super::{StorageError, StorageResult, StoreItems, Storage, etag_allows, stamp_etag};

/// Process-local storage. Records vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<String, serde_json::Value>,
    etag: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn next_etag(&self) -> String {
        (self.etag.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    #[instrument(name = "storage.memory.read", skip(self, keys), fields(count = keys.len()))]
    async fn read(&self, keys: &[String]) -> StorageResult<StoreItems> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.records
                    .get(key)
                    .map(|entry| (key.clone(), entry.value().clone()))
            })
            .collect())
    }

    #[instrument(name = "storage.memory.write", skip(self, changes), fields(count = changes.len()))]
    async fn write(&self, changes: StoreItems) -> StorageResult<()> {
        for (key, record) in &changes {
            let existing = self.records.get(key).map(|entry| entry.value().clone());
            if !etag_allows(record, existing.as_ref()) {
                return Err(StorageError::EtagConflict { key: key.clone() });
            }
        }
        for (key, record) in changes {
            let stamped = stamp_etag(record, self.next_etag());
            self.records.insert(key, stamped);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.records.remove(key);
        }
        Ok(())
    }
}
