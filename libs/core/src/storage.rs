mod file;
mod memory;

use std::{collections::BTreeMap, env, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Records keyed by storage key. Each record is a JSON object.
pub type StoreItems = BTreeMap<String, Value>;

/// Field carrying the optimistic concurrency token inside a record.
pub const ETAG_FIELD: &str = "eTag";
/// Token that disables the concurrency check for a write.
pub const ETAG_ANY: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("etag conflict writing `{key}`")]
    EtagConflict { key: String },
    #[error("storage record is not valid json")]
    Serialization(#[from] serde_json::Error),
    #[error("storage io error")]
    Io(#[from] std::io::Error),
    #[error("storage backend error")]
    Backend(#[source] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key/JSON-blob store the memory scopes persist through.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the records that exist for `keys`; missing keys are simply absent.
    async fn read(&self, keys: &[String]) -> StorageResult<StoreItems>;
    async fn write(&self, changes: StoreItems) -> StorageResult<()>;
    async fn delete(&self, keys: &[String]) -> StorageResult<()>;
}

pub type SharedStorage = Arc<dyn Storage>;

pub fn shared_memory_storage() -> SharedStorage {
    Arc::new(MemoryStorage::new())
}

/// Builds a storage provider from environment variables.
///
/// `TOYBOX_STORAGE_DIR` selects a file-backed store rooted at that directory;
/// otherwise records stay in memory.
pub fn storage_from_env() -> SharedStorage {
    match env::var("TOYBOX_STORAGE_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            info!(dir = %dir, "using file storage");
            Arc::new(FileStorage::new(dir))
        }
        _ => shared_memory_storage(),
    }
}

/// Checks the incoming record's etag against the stored one. Returns `false`
/// when the write must be rejected.
pub(crate) fn etag_allows(incoming: &Value, existing: Option<&Value>) -> bool {
    let Some(expected) = incoming.get(ETAG_FIELD).and_then(Value::as_str) else {
        return true;
    };
    if expected == ETAG_ANY {
        return true;
    }
    match existing.and_then(|record| record.get(ETAG_FIELD)).and_then(Value::as_str) {
        Some(current) => current == expected,
        None => true,
    }
}

pub(crate) fn stamp_etag(mut record: Value, etag: String) -> Value {
    if let Value::Object(map) = &mut record {
        map.insert(ETAG_FIELD.to_string(), Value::String(etag));
    }
    record
}
