use toybox_core::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("fragment `{name}` is already registered in scope `{scope}`")]
    DuplicateFragment { scope: String, name: String },
    #[error("scope `{scope}` cannot derive a storage key from this turn")]
    MissingScopeKey { scope: String },
    #[error("scope `{scope}` record is not loaded for this turn")]
    NotLoaded { scope: String },
    #[error("list already contains an item with id `{id}`")]
    DuplicateItem { id: String },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("fragment value does not match the requested type")]
    Serialization(#[from] serde_json::Error),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
