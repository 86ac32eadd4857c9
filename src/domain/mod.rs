pub mod board;
pub mod drag;
pub mod ids;
pub mod reorder;
pub mod resolver;
pub mod task;

pub use board::{Board, Column, DEFAULT_COLUMN_TITLES};
pub use drag::{DragSession, DragState, DropTarget};
pub use ids::{ColumnId, CommentId, TaskId};
pub use reorder::{reorder, reorder_columns};
pub use resolver::resolve;
pub use task::{Comment, Task, DEFAULT_COLOR, PALETTE};
