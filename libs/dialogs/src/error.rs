use reqwest::StatusCode;
use toybox_memory::MemoryError;

#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("dialog `{0}` is already registered")]
    DuplicateDialog(String),
    #[error("dialog `{0}` is not registered")]
    UnknownDialog(String),
    #[error("remote dialog responded with status {status}")]
    Transport { status: StatusCode, body: String },
    #[error("remote dialog request failed")]
    Http(#[from] reqwest::Error),
    #[error("invalid remote dialog target: {0}")]
    InvalidTarget(String),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("dialog payload is not valid json")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DialogResult<T> = Result<T, DialogError>;
