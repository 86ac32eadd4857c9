//! # LifeOS Kanban
//!
//! Kanban board core for the LifeOS dashboard: a normalized task/column
//! model, the drag-reorder engine that relocates tasks within and across
//! columns, and a board store that applies mutations optimistically while a
//! background worker persists them.
//!
//! The storage technology is pluggable through the [`Storage`] trait.

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::{KanbanConfig, StorageBackend};
pub use domain::{
    board::{Board, Column},
    drag::{DragSession, DragState},
    ids::{ColumnId, CommentId, TaskId},
    reorder::{reorder, reorder_columns},
    resolver::resolve,
    task::{Comment, Task},
};
pub use error::{KanbanError, Result};
pub use storage::Storage;
pub use store::BoardStore;
pub use sync::{PersistenceSync, SyncPlan, SyncReport};
