//! Pure computation of a board after a completed drag gesture.
//!
//! Every function here returns a new board and never fails: an id that
//! cannot be resolved, a drop outside any target, or a drop on the dragged
//! item itself all produce a board equal to the input. Columns that did not
//! change stay shared with the input board.

use crate::domain::{board::Board, resolver::resolve};
use std::sync::Arc;

/// Computes the board after dropping task `active_id` on `over_id`.
///
/// `over_id` may name a task (insert before it, or take its slot when moving
/// within one column) or a column (append to that column). `None` means the
/// drop landed outside any target.
pub fn reorder(board: &Board, active_id: &str, over_id: Option<&str>) -> Board {
    move_task(board, active_id, over_id).unwrap_or_else(|| board.clone())
}

/// Computes the board after dropping column `active_id` on `over_id`, which
/// may be another column or any task inside it.
pub fn reorder_columns(board: &Board, active_id: &str, over_id: Option<&str>) -> Board {
    move_column(board, active_id, over_id).unwrap_or_else(|| board.clone())
}

fn move_task(board: &Board, active_id: &str, over_id: Option<&str>) -> Option<Board> {
    let over_id = over_id?;
    if !board.has_task(active_id) {
        return None;
    }

    let source_id = resolve(board, active_id)?;
    let target_id = resolve(board, over_id)?;

    if source_id == target_id {
        let column = board.column(source_id.as_str())?;
        let old_index = column.position_of(active_id)?;
        // A drop on the column's own background sends the task to the end.
        let new_index = column
            .position_of(over_id)
            .unwrap_or(column.task_ids.len() - 1);
        if old_index == new_index {
            return None;
        }

        let mut column = column.clone();
        relocate(&mut column.task_ids, old_index, new_index);

        let mut next = board.clone();
        next.replace_column(column);
        return Some(next);
    }

    let mut source = board.column(source_id.as_str())?.clone();
    let mut target = board.column(target_id.as_str())?.clone();

    let old_index = source.position_of(active_id)?;
    let task_id = source.task_ids.remove(old_index);

    let insert_at = if target.id.as_str() == over_id {
        target.task_ids.len()
    } else {
        target
            .position_of(over_id)
            .unwrap_or(target.task_ids.len())
    };
    target.task_ids.insert(insert_at, task_id);

    let mut next = board.clone();
    next.replace_column(source);
    next.replace_column(target);
    Some(next)
}

fn move_column(board: &Board, active_id: &str, over_id: Option<&str>) -> Option<Board> {
    let over_id = over_id?;
    if !board.has_column(active_id) {
        return None;
    }
    let target_id = resolve(board, over_id)?;

    let old_index = board.column_order.iter().position(|id| id.as_str() == active_id)?;
    let new_index = board.column_order.iter().position(|id| id == target_id)?;
    if old_index == new_index {
        return None;
    }

    let mut order = board.column_order.to_vec();
    relocate(&mut order, old_index, new_index);

    let mut next = board.clone();
    next.column_order = Arc::new(order);
    Some(next)
}

/// Moves the element at `from` so that it ends up at `to`, keeping the
/// relative order of every other element.
fn relocate<T>(items: &mut Vec<T>, from: usize, to: usize) {
    let item = items.remove(from);
    items.insert(to, item);
}
