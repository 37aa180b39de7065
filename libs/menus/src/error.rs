use toybox_memory::MemoryError;

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("menu `{0}` is already registered")]
    DuplicateMenu(String),
    #[error("menu `{0}` is not registered")]
    UnknownMenu(String),
    #[error("invalid menu settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("failed to send menu")]
    Delivery(#[source] anyhow::Error),
    #[error("menu handler failed")]
    Handler(#[source] anyhow::Error),
}

pub type MenuResult<T> = Result<T, MenuError>;
