//! The single source of truth the UI reads the board from.

use crate::{
    domain::{
        reorder, reorder_columns, Board, Column, CommentId, DragSession, DropTarget, TaskId,
    },
    error::{KanbanError, Result},
    storage::Storage,
    sync::{PersistenceSync, SyncPlan, SyncReport},
};
use std::sync::Arc;

/// Holds the current board snapshot and applies every mutation to it.
///
/// Drag commits and color changes are applied locally at once and persisted
/// in the background. Task and comment creation wait for storage so the
/// local board only ever holds storage-assigned ids.
pub struct BoardStore {
    storage: Arc<dyn Storage>,
    user_id: String,
    board_id: String,
    board: Board,
    drag: DragSession,
    sync: PersistenceSync,
}

impl BoardStore {
    /// Loads the user's board and starts its persistence worker
    pub async fn load(storage: Arc<dyn Storage>, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let snapshot = storage.get_board(&user_id).await?;
        snapshot.board.validate()?;
        tracing::debug!(
            user_id = %user_id,
            board_id = %snapshot.board_id,
            tasks = snapshot.board.tasks.len(),
            "board loaded"
        );

        let sync = PersistenceSync::spawn(Arc::clone(&storage), snapshot.board_id.clone());
        Ok(Self {
            storage,
            user_id,
            board_id: snapshot.board_id,
            board: snapshot.board,
            drag: DragSession::new(),
            sync,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    /// Replaces the local board with storage's copy once queued writes land
    pub async fn refresh(&mut self) -> Result<()> {
        self.sync.flush().await?;
        let snapshot = self.storage.get_board(&self.user_id).await?;
        snapshot.board.validate()?;
        self.board = snapshot.board;
        Ok(())
    }

    /// Creates a task at the top of a column.
    ///
    /// Queued writes are drained first so the column list storage extends is
    /// the one the user sees.
    pub async fn add_task(&mut self, column_id: &str, content: &str) -> Result<TaskId> {
        if content.trim().is_empty() {
            return Err(KanbanError::EmptyContent("Task"));
        }
        let column = self
            .board
            .column(column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound(column_id.to_string()))?;
        let column_id = column.id.clone();

        self.sync.flush().await?;
        let task = self.storage.create_task(&column_id, content).await?;
        let task_id = task.id.clone();
        tracing::debug!(task_id = %task_id, column_id = %column_id, "task created");

        let Some(column) = self.board.column(column_id.as_str()) else {
            return Err(KanbanError::ColumnNotFound(column_id.to_string()));
        };
        if !column.contains(task_id.as_str()) {
            let mut column: Column = column.clone();
            column.task_ids.insert(0, task_id.clone());
            self.board.replace_column(column);
        }
        Arc::make_mut(&mut self.board.tasks).insert(task_id.clone(), task);

        Ok(task_id)
    }

    /// Appends a comment to a task's thread
    pub async fn add_comment(&mut self, task_id: &str, content: &str) -> Result<CommentId> {
        if content.trim().is_empty() {
            return Err(KanbanError::EmptyContent("Comment"));
        }
        let task_id = self
            .board
            .task(task_id)
            .map(|t| t.id.clone())
            .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;

        let comment = self.storage.add_comment(&task_id, content).await?;
        let comment_id = comment.id.clone();

        // The task may not survive a refresh that ran while awaiting storage.
        if let Some(task) = Arc::make_mut(&mut self.board.tasks).get_mut(task_id.as_str()) {
            task.push_comment(comment);
        }
        Ok(comment_id)
    }

    /// Sets a task's color tag locally and queues the durable write
    pub fn update_task_color(&mut self, task_id: &str, color: &str) -> Result<()> {
        let task = self
            .board
            .task(task_id)
            .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;
        if task.color == color {
            return Ok(());
        }
        let task_id = task.id.clone();

        // Only a real change may unshare the task map.
        if let Some(task) = Arc::make_mut(&mut self.board.tasks).get_mut(task_id.as_str()) {
            task.color = color.to_string();
        }
        self.sync.enqueue_task_color(task_id, color.to_string());
        Ok(())
    }

    /// Applies a completed task drop. Returns whether the board changed.
    pub fn commit_reorder(&mut self, active_id: &str, over_id: Option<&str>) -> bool {
        let next = reorder(&self.board, active_id, over_id);
        self.apply(next)
    }

    /// Applies a completed column drop. Returns whether the board changed.
    pub fn commit_column_reorder(&mut self, active_id: &str, over_id: Option<&str>) -> bool {
        let next = reorder_columns(&self.board, active_id, over_id);
        self.apply(next)
    }

    fn apply(&mut self, next: Board) -> bool {
        let plan = SyncPlan::between(&self.board, &next);
        if plan.is_empty() {
            return false;
        }
        tracing::debug!(
            columns = plan.columns.len(),
            column_order = plan.column_order.is_some(),
            "committing board change"
        );
        self.board = next;
        self.sync.enqueue(plan);
        true
    }

    /// Picks up a task or a column
    pub fn begin_drag(&mut self, active_id: &str) {
        self.drag.start(active_id);
    }

    /// Tracks the target under the pointer; the board is not touched
    pub fn drag_over(&mut self, over_id: Option<&str>) {
        self.drag.hover(over_id);
    }

    /// Ends the gesture and commits the drop, if any. Returns whether the
    /// board changed.
    pub fn end_drag(&mut self, over_id: Option<&str>) -> bool {
        let Some(DropTarget { active_id, over_id }) = self.drag.finish(over_id) else {
            return false;
        };
        if self.board.has_column(&active_id) {
            self.commit_column_reorder(&active_id, Some(over_id.as_str()))
        } else {
            self.commit_reorder(&active_id, Some(over_id.as_str()))
        }
    }

    /// Abandons the gesture without touching the board
    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Waits for every queued durable write to be attempted
    pub async fn flush(&self) -> Result<SyncReport> {
        self.sync.flush().await
    }

    /// Drains the persistence queue and stops its worker
    pub async fn shutdown(self) -> Result<SyncReport> {
        self.sync.shutdown().await
    }
}
