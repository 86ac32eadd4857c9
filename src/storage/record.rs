//! Storage shape of a board.
//!
//! Backends keep boards denormalized: each column carries the task records
//! that were created in it alongside its ordered `task_ids`. A task record
//! stays with its home column when it is dragged elsewhere; only the id lists
//! move. [`StoredBoard::to_board`] normalizes this into a [`Board`].

use crate::{
    domain::{Board, Column, ColumnId, Comment, Task, TaskId},
    error::{KanbanError, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

/// A board as returned by storage, with the storage-side board id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub board_id: String,
    pub board: Board,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredColumn {
    pub id: ColumnId,
    pub title: String,
    pub task_ids: Vec<TaskId>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBoard {
    pub id: String,
    pub user_id: String,
    pub column_order: Vec<ColumnId>,
    pub columns: Vec<StoredColumn>,
}

/// Generates a storage-side identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl StoredBoard {
    /// Creates an empty board for a user with one column per title
    pub fn bootstrap<S: AsRef<str>>(user_id: &str, titles: &[S]) -> Self {
        let columns: Vec<StoredColumn> = titles
            .iter()
            .map(|title| StoredColumn {
                id: ColumnId::new(new_id()),
                title: title.as_ref().to_string(),
                task_ids: Vec::new(),
                tasks: Vec::new(),
            })
            .collect();

        Self {
            id: new_id(),
            user_id: user_id.to_string(),
            column_order: columns.iter().map(|c| c.id.clone()).collect(),
            columns,
        }
    }

    /// Builds the storage shape of a board, filing each task under the
    /// column that currently holds it
    pub fn from_board(id: impl Into<String>, user_id: impl Into<String>, board: &Board) -> Self {
        let columns = board
            .columns
            .values()
            .map(|column| StoredColumn {
                id: column.id.clone(),
                title: column.title.clone(),
                task_ids: column.task_ids.clone(),
                tasks: board.tasks_in(column.id.as_str()).cloned().collect(),
            })
            .collect();

        Self {
            id: id.into(),
            user_id: user_id.into(),
            column_order: board.column_order.to_vec(),
            columns,
        }
    }

    /// Normalizes into a [`Board`].
    ///
    /// The id lists of a cross-column move are written one column at a time,
    /// so a reader can see them mid-move, and a failed write can leave them
    /// disagreeing for good. Normalization repairs this on read: unknown and
    /// repeated ids are dropped (the first placement in display order wins),
    /// and a task no column lists goes back to the end of its home column.
    pub fn to_board(&self) -> Result<Board> {
        let mut by_id: HashMap<&str, &StoredColumn> = HashMap::new();
        for column in &self.columns {
            by_id.entry(column.id.as_str()).or_insert(column);
        }

        let mut display: Vec<&StoredColumn> = Vec::with_capacity(by_id.len());
        let mut listed = HashSet::new();
        for id in &self.column_order {
            match by_id.get(id.as_str()) {
                Some(&column) if listed.insert(id.as_str()) => display.push(column),
                Some(_) => warn!(board_id = %self.id, column_id = %id, "dropping repeated column from column order"),
                None => warn!(board_id = %self.id, column_id = %id, "dropping unknown column from column order"),
            }
        }
        for column in &self.columns {
            if listed.insert(column.id.as_str()) {
                warn!(board_id = %self.id, column_id = %column.id, "appending column missing from column order");
                display.push(column);
            }
        }

        let mut tasks: HashMap<&str, &Task> = HashMap::new();
        for task in self.columns.iter().flat_map(|c| c.tasks.iter()) {
            tasks.entry(task.id.as_str()).or_insert(task);
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut columns: Vec<Column> = Vec::with_capacity(display.len());
        for stored in display {
            let mut task_ids = Vec::with_capacity(stored.task_ids.len());
            for id in &stored.task_ids {
                if !tasks.contains_key(id.as_str()) {
                    warn!(board_id = %self.id, column_id = %stored.id, task_id = %id, "dropping unknown task id");
                } else if !placed.insert(id.as_str()) {
                    warn!(board_id = %self.id, column_id = %stored.id, task_id = %id, "dropping repeated task placement");
                } else {
                    task_ids.push(id.clone());
                }
            }
            columns.push(Column {
                id: stored.id.clone(),
                title: stored.title.clone(),
                task_ids,
            });
        }

        for home in &self.columns {
            for task in &home.tasks {
                if !placed.insert(task.id.as_str()) {
                    continue;
                }
                warn!(board_id = %self.id, column_id = %home.id, task_id = %task.id, "returning unplaced task to its home column");
                if let Some(column) = columns.iter_mut().find(|c| c.id == home.id) {
                    column.task_ids.push(task.id.clone());
                }
            }
        }

        Board::from_parts(tasks.into_values().cloned(), columns)
    }

    pub fn snapshot(&self) -> Result<BoardSnapshot> {
        Ok(BoardSnapshot {
            board_id: self.id.clone(),
            board: self.to_board()?,
        })
    }

    pub fn has_column(&self, id: &str) -> bool {
        self.columns.iter().any(|c| c.id.as_str() == id)
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.tasks.iter().any(|t| t.id.as_str() == id))
    }

    /// Checks whether an id names this board, one of its columns or tasks
    pub fn owns(&self, id: &str) -> bool {
        self.id == id || self.has_column(id) || self.has_task(id)
    }

    fn column_mut(&mut self, id: &str) -> Result<&mut StoredColumn> {
        self.columns
            .iter_mut()
            .find(|c| c.id.as_str() == id)
            .ok_or_else(|| KanbanError::ColumnNotFound(id.to_string()))
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.columns
            .iter_mut()
            .flat_map(|c| c.tasks.iter_mut())
            .find(|t| t.id.as_str() == id)
            .ok_or_else(|| KanbanError::TaskNotFound(id.to_string()))
    }

    /// Replaces the column order; it must name every column exactly once
    pub fn set_column_order(&mut self, order: &[ColumnId]) -> Result<()> {
        let expected: HashSet<&str> = self.columns.iter().map(|c| c.id.as_str()).collect();
        let given: HashSet<&str> = order.iter().map(ColumnId::as_str).collect();
        if given != expected || order.len() != expected.len() {
            return Err(KanbanError::InvalidBoard(format!(
                "column order for board {} is not a permutation of its columns",
                self.id
            )));
        }
        self.column_order = order.to_vec();
        Ok(())
    }

    /// Replaces a column's task list; every id must name a stored task of
    /// this board, at most once
    pub fn set_column_task_ids(&mut self, column_id: &str, task_ids: &[TaskId]) -> Result<()> {
        let mut seen = HashSet::new();
        for id in task_ids {
            if !self.has_task(id.as_str()) {
                return Err(KanbanError::TaskNotFound(id.to_string()));
            }
            if !seen.insert(id.as_str()) {
                return Err(KanbanError::InvalidBoard(format!(
                    "task {} is listed twice for column {}",
                    id, column_id
                )));
            }
        }
        self.column_mut(column_id)?.task_ids = task_ids.to_vec();
        Ok(())
    }

    /// Stores a new task in a column and lists it first
    pub fn insert_task(&mut self, column_id: &str, task: Task) -> Result<()> {
        let column = self.column_mut(column_id)?;
        column.task_ids.insert(0, task.id.clone());
        column.tasks.push(task);
        Ok(())
    }

    pub fn push_comment(&mut self, task_id: &str, comment: Comment) -> Result<()> {
        self.task_mut(task_id)?.push_comment(comment);
        Ok(())
    }

    pub fn set_task_color(&mut self, task_id: &str, color: &str) -> Result<()> {
        self.task_mut(task_id)?.color = color.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{reorder, CommentId, DEFAULT_COLUMN_TITLES};

    fn stored_with_tasks() -> StoredBoard {
        let mut stored = StoredBoard::bootstrap("user-1", &DEFAULT_COLUMN_TITLES);
        let first = stored.column_order[0].clone();
        stored
            .insert_task(first.as_str(), Task::new(TaskId::new("task-1"), "one".to_string()))
            .unwrap();
        stored
            .insert_task(first.as_str(), Task::new(TaskId::new("task-2"), "two".to_string()))
            .unwrap();
        stored
    }

    #[test]
    fn test_bootstrap_default_columns() {
        let stored = StoredBoard::bootstrap("user-1", &DEFAULT_COLUMN_TITLES);
        let board = stored.to_board().unwrap();

        let titles: Vec<_> = board.ordered_columns().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["To Do", "In Progress", "Done"]);
        assert!(board.tasks.is_empty());
    }

    #[test]
    fn test_insert_task_goes_first() {
        let stored = stored_with_tasks();
        let board = stored.to_board().unwrap();

        let first = &stored.column_order[0];
        let ids: Vec<_> = board.tasks_in(first.as_str()).map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-2", "task-1"]);
    }

    #[test]
    fn test_moved_task_normalizes_from_home_column() {
        let mut stored = stored_with_tasks();
        let first = stored.column_order[0].clone();
        let second = stored.column_order[1].clone();

        stored
            .set_column_task_ids(first.as_str(), &[TaskId::new("task-1")])
            .unwrap();
        stored
            .set_column_task_ids(second.as_str(), &[TaskId::new("task-2")])
            .unwrap();

        let board = stored.to_board().unwrap();
        assert_eq!(board.tasks.len(), 2);
        assert!(board.column(second.as_str()).unwrap().contains("task-2"));
    }

    #[test]
    fn test_round_trip_through_storage_shape() {
        let mut stored = stored_with_tasks();
        stored
            .push_comment("task-1", Comment::new(CommentId::new("c1"), "note".to_string()))
            .unwrap();
        stored.set_task_color("task-2", "bg-blue-100").unwrap();

        let board = stored.to_board().unwrap();
        let second = stored.column_order[1].clone();
        let moved = reorder(&board, "task-1", Some(second.as_str()));

        let reshaped = StoredBoard::from_board(stored.id.clone(), "user-1", &moved);
        let json = serde_json::to_string(&reshaped).unwrap();
        let reloaded: StoredBoard = serde_json::from_str(&json).unwrap();

        assert_eq!(reloaded.to_board().unwrap(), moved);
    }

    #[test]
    fn test_half_written_move_still_loads() {
        let mut stored = stored_with_tasks();
        let first = stored.column_order[0].clone();

        // The source column dropped task-1 but the target write never landed.
        stored.columns[0].task_ids = vec![TaskId::new("task-2")];

        let board = stored.to_board().unwrap();
        let ids: Vec<_> = board.tasks_in(first.as_str()).map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-2", "task-1"]);
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_mid_move_duplicate_keeps_first_placement() {
        let mut stored = stored_with_tasks();
        let first = stored.column_order[0].clone();
        let second = stored.column_order[1].clone();

        // Target column written first, listed ahead of the source.
        stored.columns[1].task_ids = vec![TaskId::new("task-1")];
        stored.column_order = vec![second.clone(), first.clone(), stored.column_order[2].clone()];

        let board = stored.to_board().unwrap();
        assert_eq!(board.column(second.as_str()).unwrap().task_ids, vec![TaskId::new("task-1")]);
        assert_eq!(board.column(first.as_str()).unwrap().task_ids, vec![TaskId::new("task-2")]);
    }

    #[test]
    fn test_normalization_drops_dangling_references() {
        let mut stored = stored_with_tasks();
        let first = stored.column_order[0].clone();
        stored.columns[0].task_ids.push(TaskId::new("ghost"));
        stored.column_order.push(ColumnId::new("gone"));
        stored.column_order.remove(2);

        let board = stored.to_board().unwrap();
        assert_eq!(
            board.column(first.as_str()).unwrap().task_ids,
            vec![TaskId::new("task-2"), TaskId::new("task-1")]
        );
        assert_eq!(board.column_order.len(), 3);
        assert_eq!(board.column_order[2], stored.columns[2].id);
    }

    #[test]
    fn test_task_ids_must_name_stored_tasks() {
        let mut stored = stored_with_tasks();
        let second = stored.column_order[1].clone();

        assert!(matches!(
            stored.set_column_task_ids(second.as_str(), &[TaskId::new("ghost")]),
            Err(KanbanError::TaskNotFound(_))
        ));
        assert!(matches!(
            stored.set_column_task_ids(
                second.as_str(),
                &[TaskId::new("task-1"), TaskId::new("task-1")]
            ),
            Err(KanbanError::InvalidBoard(_))
        ));
        assert!(stored.columns[1].task_ids.is_empty());
    }

    #[test]
    fn test_column_order_must_be_permutation() {
        let mut stored = StoredBoard::bootstrap("user-1", &DEFAULT_COLUMN_TITLES);
        let mut order = stored.column_order.clone();
        order.reverse();
        assert!(stored.set_column_order(&order).is_ok());
        assert_eq!(stored.column_order, order);

        let partial = order[..2].to_vec();
        assert!(stored.set_column_order(&partial).is_err());

        let duplicated = vec![order[0].clone(), order[0].clone(), order[1].clone()];
        assert!(stored.set_column_order(&duplicated).is_err());
    }

    #[test]
    fn test_unknown_references() {
        let mut stored = StoredBoard::bootstrap("user-1", &DEFAULT_COLUMN_TITLES);

        assert!(matches!(
            stored.set_column_task_ids("nope", &[]),
            Err(KanbanError::ColumnNotFound(_))
        ));
        assert!(matches!(
            stored.set_task_color("nope", "bg-white"),
            Err(KanbanError::TaskNotFound(_))
        ));
    }
}
