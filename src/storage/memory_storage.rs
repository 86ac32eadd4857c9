use crate::{
    domain::{ColumnId, Comment, CommentId, Task, TaskId, DEFAULT_COLUMN_TITLES},
    error::{KanbanError, Result},
    storage::{
        record::{new_id, BoardSnapshot, StoredBoard},
        Storage,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process storage, keyed by user id
pub struct MemoryStorage {
    boards: Mutex<HashMap<String, StoredBoard>>,
    default_columns: Vec<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_default_columns(DEFAULT_COLUMN_TITLES)
    }

    /// Creates a storage whose lazily created boards use these column titles
    pub fn with_default_columns<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            boards: Mutex::new(HashMap::new()),
            default_columns: titles.into_iter().map(Into::into).collect(),
        }
    }

    /// Seeds a stored board, replacing any board the user already had
    pub async fn insert(&self, board: StoredBoard) {
        self.boards.lock().await.insert(board.user_id.clone(), board);
    }

    /// Returns a copy of the stored board for a user
    pub async fn stored(&self, user_id: &str) -> Option<StoredBoard> {
        self.boards.lock().await.get(user_id).cloned()
    }

    async fn with_board<T, P, F>(&self, predicate: P, missing: KanbanError, apply: F) -> Result<T>
    where
        P: Fn(&StoredBoard) -> bool,
        F: FnOnce(&mut StoredBoard) -> Result<T>,
    {
        let mut boards = self.boards.lock().await;
        let board = boards.values_mut().find(|b| predicate(b)).ok_or(missing)?;
        apply(board)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_board(&self, user_id: &str) -> Result<BoardSnapshot> {
        let mut boards = self.boards.lock().await;
        let board = boards.entry(user_id.to_string()).or_insert_with(|| {
            tracing::info!(user_id, "creating default board");
            StoredBoard::bootstrap(user_id, self.default_columns.as_slice())
        });
        board.snapshot()
    }

    async fn update_column_order(&self, board_id: &str, order: &[ColumnId]) -> Result<()> {
        self.with_board(
            |b| b.id == board_id,
            KanbanError::BoardNotFound(board_id.to_string()),
            |b| b.set_column_order(order),
        )
        .await
    }

    async fn update_column_task_ids(&self, column_id: &ColumnId, task_ids: &[TaskId]) -> Result<()> {
        self.with_board(
            |b| b.has_column(column_id.as_str()),
            KanbanError::ColumnNotFound(column_id.to_string()),
            |b| b.set_column_task_ids(column_id.as_str(), task_ids),
        )
        .await
    }

    async fn create_task(&self, column_id: &ColumnId, content: &str) -> Result<Task> {
        let task = Task::new(TaskId::new(new_id()), content.to_string());
        self.with_board(
            |b| b.has_column(column_id.as_str()),
            KanbanError::ColumnNotFound(column_id.to_string()),
            |b| b.insert_task(column_id.as_str(), task.clone()),
        )
        .await?;
        Ok(task)
    }

    async fn add_comment(&self, task_id: &TaskId, content: &str) -> Result<Comment> {
        let comment = Comment::new(CommentId::new(new_id()), content.to_string());
        self.with_board(
            |b| b.has_task(task_id.as_str()),
            KanbanError::TaskNotFound(task_id.to_string()),
            |b| b.push_comment(task_id.as_str(), comment.clone()),
        )
        .await?;
        Ok(comment)
    }

    async fn update_task_color(&self, task_id: &TaskId, color: &str) -> Result<()> {
        self.with_board(
            |b| b.has_task(task_id.as_str()),
            KanbanError::TaskNotFound(task_id.to_string()),
            |b| b.set_task_color(task_id.as_str(), color),
        )
        .await
    }
}
