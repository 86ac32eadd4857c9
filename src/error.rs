use thiserror::Error;

pub type Result<T> = std::result::Result<T, KanbanError>;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    #[error("{0} content must not be empty")]
    EmptyContent(&'static str),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence queue is closed")]
    SyncClosed,

    #[cfg(feature = "sqlite-storage")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
