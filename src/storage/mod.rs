use crate::{
    domain::{ColumnId, Comment, Task, TaskId},
    error::Result,
};
use async_trait::async_trait;

pub mod memory_storage;
pub mod record;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

pub use memory_storage::MemoryStorage;
pub use record::{BoardSnapshot, StoredBoard, StoredColumn};

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Durable storage for kanban boards.
///
/// Authorization is the backend's concern; callers only ever pass ids of a
/// board they loaded through [`Storage::get_board`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads the user's board, creating one with the default columns if the
    /// user has none yet
    async fn get_board(&self, user_id: &str) -> Result<BoardSnapshot>;

    /// Replaces the display order of a board's columns
    async fn update_column_order(&self, board_id: &str, order: &[ColumnId]) -> Result<()>;

    /// Replaces the full ordered task id list of a column
    async fn update_column_task_ids(&self, column_id: &ColumnId, task_ids: &[TaskId]) -> Result<()>;

    /// Creates a task at the front of a column and returns it with its
    /// storage-assigned id
    async fn create_task(&self, column_id: &ColumnId, content: &str) -> Result<Task>;

    /// Appends a comment to a task and returns it with its storage-assigned id
    async fn add_comment(&self, task_id: &TaskId, content: &str) -> Result<Comment>;

    /// Sets a task's color tag
    async fn update_task_color(&self, task_id: &TaskId, color: &str) -> Result<()>;
}
