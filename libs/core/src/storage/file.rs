use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::instrument;

use super::{StorageError, StorageResult, StoreItems, Storage, etag_allows, stamp_etag};

/// Stores each record as `<dir>/<sanitized key>.json`.
///
/// Etags are the record's write time in nanoseconds; good enough for a single
/// writer process.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    async fn read_one(&self, key: &str) -> StorageResult<Option<Value>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// Keeps `[A-Za-z0-9._-]` and percent-encodes everything else so distinct keys
/// never collide on disk.
fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[async_trait]
impl Storage for FileStorage {
    #[instrument(name = "storage.file.read", skip(self, keys), fields(count = keys.len()))]
    async fn read(&self, keys: &[String]) -> StorageResult<StoreItems> {
        let mut found = StoreItems::new();
        for key in keys {
            if let Some(record) = self.read_one(key).await? {
                found.insert(key.clone(), record);
            }
        }
        Ok(found)
    }

    #[instrument(name = "storage.file.write", skip(self, changes), fields(count = changes.len()))]
    async fn write(&self, changes: StoreItems) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await?;
        for (key, record) in changes {
            let existing = self.read_one(&key).await?;
            if !etag_allows(&record, existing.as_ref()) {
                return Err(StorageError::EtagConflict { key });
            }
            let etag = time::OffsetDateTime::now_utc()
                .unix_timestamp_nanos()
                .to_string();
            let bytes = serde_json::to_vec_pretty(&stamp_etag(record, etag))?;
            fs::write(self.path_for(&key), bytes).await?;
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StorageError::Io(err)),
            }
        }
        Ok(())
    }
}
