use crate::{
    domain::{
        ids::{ColumnId, TaskId},
        task::Task,
    },
    error::{KanbanError, Result},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Titles of the columns every new board starts with
pub const DEFAULT_COLUMN_TITLES: [&str; 3] = ["To Do", "In Progress", "Done"];

/// A named, ordered bucket of task ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub task_ids: Vec<TaskId>,
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            task_ids: Vec::new(),
        }
    }

    pub fn with_tasks<I, T>(mut self, task_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.task_ids = task_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Position of a task id within this column
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.task_ids.iter().position(|t| t.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position_of(id).is_some()
    }
}

/// Normalized kanban board state.
///
/// Tasks and columns live in id-keyed maps; membership and order are carried
/// only by `Column::task_ids` and `column_order`. Fields are reference counted
/// so a derived board can share everything it did not touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub tasks: Arc<HashMap<TaskId, Task>>,
    pub columns: HashMap<ColumnId, Arc<Column>>,
    pub column_order: Arc<Vec<ColumnId>>,
}

impl Board {
    /// Builds a board from tasks and columns, using the column iteration
    /// order as display order. Fails if the result breaks a board invariant.
    pub fn from_parts<T, C>(tasks: T, columns: C) -> Result<Self>
    where
        T: IntoIterator<Item = Task>,
        C: IntoIterator<Item = Column>,
    {
        let tasks: HashMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut order = Vec::new();
        let mut column_map = HashMap::new();
        for column in columns {
            order.push(column.id.clone());
            column_map.insert(column.id.clone(), Arc::new(column));
        }

        let board = Self {
            tasks: Arc::new(tasks),
            columns: column_map,
            column_order: Arc::new(order),
        };
        board.validate()?;
        Ok(board)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.get(id).map(Arc::as_ref)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn has_column(&self, id: &str) -> bool {
        self.columns.contains_key(id)
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Columns in display order
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.column_order.iter().filter_map(|id| self.column(id.as_str()))
    }

    /// Tasks of a column in display order
    pub fn tasks_in<'a>(&'a self, column_id: &str) -> impl Iterator<Item = &'a Task> + 'a {
        self.column(column_id)
            .into_iter()
            .flat_map(|c| c.task_ids.iter())
            .filter_map(|id| self.tasks.get(id.as_str()))
    }

    /// Number of task ids held across all columns
    pub fn placed_task_count(&self) -> usize {
        self.columns.values().map(|c| c.task_ids.len()).sum()
    }

    /// Checks whether both boards hold the same allocation for `tasks`
    pub fn shares_tasks(&self, other: &Board) -> bool {
        Arc::ptr_eq(&self.tasks, &other.tasks)
    }

    /// Checks whether both boards hold the same allocation for a column
    pub fn shares_column(&self, other: &Board, id: &str) -> bool {
        match (self.columns.get(id), other.columns.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Replaces a column, leaving every other column shared
    pub(crate) fn replace_column(&mut self, column: Column) {
        self.columns.insert(column.id.clone(), Arc::new(column));
    }

    /// Checks the board invariants:
    /// every placed task id exists and is placed exactly once, every task is
    /// placed, and `column_order` is a permutation of the column keys.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for column in self.columns.values() {
            for id in &column.task_ids {
                if !self.tasks.contains_key(id.as_str()) {
                    return Err(KanbanError::InvalidBoard(format!(
                        "column {} references unknown task {}",
                        column.id, id
                    )));
                }
                if !seen.insert(id.as_str()) {
                    return Err(KanbanError::InvalidBoard(format!(
                        "task {} is placed more than once",
                        id
                    )));
                }
            }
        }
        if let Some(orphan) = self.tasks.keys().find(|id| !seen.contains(id.as_str())) {
            return Err(KanbanError::InvalidBoard(format!(
                "task {} is not placed in any column",
                orphan
            )));
        }

        let mut ordered: HashSet<&str> = HashSet::new();
        for id in self.column_order.iter() {
            if !self.columns.contains_key(id.as_str()) {
                return Err(KanbanError::InvalidBoard(format!(
                    "column order references unknown column {}",
                    id
                )));
            }
            if !ordered.insert(id.as_str()) {
                return Err(KanbanError::InvalidBoard(format!(
                    "column {} appears twice in column order",
                    id
                )));
            }
        }
        if ordered.len() != self.columns.len() {
            return Err(KanbanError::InvalidBoard(
                "column order is missing columns".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;

    fn task(id: &str) -> Task {
        Task::new(TaskId::new(id), format!("content of {}", id))
    }

    fn sample_board() -> Board {
        Board::from_parts(
            vec![task("task-1"), task("task-2"), task("task-3")],
            vec![
                Column::new("col-1", "To Do").with_tasks(["task-1", "task-2"]),
                Column::new("col-2", "In Progress").with_tasks(["task-3"]),
                Column::new("col-3", "Done"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_board_creation() {
        let board = sample_board();

        assert_eq!(board.columns.len(), 3);
        assert_eq!(board.placed_task_count(), 3);
        let titles: Vec<_> = board.ordered_columns().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, DEFAULT_COLUMN_TITLES.to_vec());
    }

    #[test]
    fn test_tasks_in_column_order() {
        let board = sample_board();

        let ids: Vec<_> = board.tasks_in("col-1").map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-1", "task-2"]);
        assert_eq!(board.tasks_in("col-3").count(), 0);
        assert_eq!(board.tasks_in("missing").count(), 0);
    }

    #[test]
    fn test_rejects_orphan_reference() {
        let result = Board::from_parts(
            vec![task("task-1")],
            vec![Column::new("col-1", "To Do").with_tasks(["task-1", "ghost"])],
        );
        assert!(matches!(result, Err(KanbanError::InvalidBoard(_))));
    }

    #[test]
    fn test_rejects_duplicate_placement() {
        let result = Board::from_parts(
            vec![task("task-1")],
            vec![
                Column::new("col-1", "To Do").with_tasks(["task-1"]),
                Column::new("col-2", "Done").with_tasks(["task-1"]),
            ],
        );
        assert!(matches!(result, Err(KanbanError::InvalidBoard(_))));
    }

    #[test]
    fn test_rejects_unplaced_task() {
        let result = Board::from_parts(vec![task("task-1")], vec![Column::new("col-1", "To Do")]);
        assert!(matches!(result, Err(KanbanError::InvalidBoard(_))));
    }

    #[test]
    fn test_rejects_bad_column_order() {
        let mut board = sample_board();
        board.column_order = Arc::new(vec![ColumnId::new("col-1"), ColumnId::new("col-1")]);
        assert!(board.validate().is_err());

        board.column_order = Arc::new(vec![ColumnId::new("col-1"), ColumnId::new("col-2")]);
        assert!(board.validate().is_err());
    }

    #[test]
    fn test_sharing_after_replace() {
        let board = sample_board();
        let mut next = board.clone();
        let column = next.column("col-1").unwrap().clone().with_tasks(["task-2", "task-1"]);
        next.replace_column(column);

        assert!(next.shares_tasks(&board));
        assert!(next.shares_column(&board, "col-2"));
        assert!(!next.shares_column(&board, "col-1"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let board = sample_board();

        let json = serde_json::to_string(&board).unwrap();
        assert!(json.contains("columnOrder"));
        assert!(json.contains("taskIds"));

        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }
}
