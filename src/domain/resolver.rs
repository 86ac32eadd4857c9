//! Maps drag-and-drop ids to the column that owns them.

use crate::domain::{board::Board, ids::ColumnId};

/// Resolves a task or column id to its owning column.
///
/// A column id resolves to itself, which is how a drop on an empty column's
/// background is recognized. A task id resolves to the column whose
/// `task_ids` contains it. Returns `None` when the id names neither.
pub fn resolve<'a>(board: &'a Board, id: &str) -> Option<&'a ColumnId> {
    if let Some((column_id, _)) = board.columns.get_key_value(id) {
        return Some(column_id);
    }

    board
        .columns
        .values()
        .find(|column| column.contains(id))
        .map(|column| &column.id)
}
