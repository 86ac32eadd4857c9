//! Background propagation of committed board mutations to storage.
//!
//! The board store applies every mutation locally first and then hands the
//! resulting writes to [`PersistenceSync`], which queues them for a single
//! worker task. Callers never wait for storage. A failed write is logged and
//! counted; local state is left as it is.
//!
//! Every write carries the complete latest value for its key (a column's id
//! list, the column order, a task color) and a sequence number. The worker
//! processes the queue in order and drops a write when a newer one for the
//! same key is already queued behind it, so storage only ever moves forward.

use crate::{
    domain::{Board, ColumnId, TaskId},
    error::{KanbanError, Result},
    storage::Storage,
};
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Durable writes needed to bring storage from one board to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub column_order: Option<Vec<ColumnId>>,
    pub columns: Vec<(ColumnId, Vec<TaskId>)>,
}

impl SyncPlan {
    /// Diffs two boards. Shared allocations are skipped without comparing
    /// contents; columns are visited in the new board's display order.
    pub fn between(before: &Board, after: &Board) -> Self {
        let column_order = if Arc::ptr_eq(&before.column_order, &after.column_order)
            || before.column_order == after.column_order
        {
            None
        } else {
            Some(after.column_order.to_vec())
        };

        let columns = after
            .ordered_columns()
            .filter(|column| {
                if after.shares_column(before, column.id.as_str()) {
                    return false;
                }
                before
                    .column(column.id.as_str())
                    .map_or(true, |old| old.task_ids != column.task_ids)
            })
            .map(|column| (column.id.clone(), column.task_ids.clone()))
            .collect();

        Self {
            column_order,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.column_order.is_none() && self.columns.is_empty()
    }
}

/// Running totals of the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Writes storage accepted
    pub applied: u64,
    /// Writes dropped because a newer write for the same key was queued
    pub skipped: u64,
    /// Writes storage rejected
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SyncKey {
    ColumnOrder,
    Column(ColumnId),
    TaskColor(TaskId),
}

#[derive(Debug)]
enum Write {
    ColumnOrder { board_id: String, order: Vec<ColumnId> },
    ColumnTasks { column_id: ColumnId, task_ids: Vec<TaskId> },
    TaskColor { task_id: TaskId, color: String },
}

impl Write {
    fn key(&self) -> SyncKey {
        match self {
            Write::ColumnOrder { .. } => SyncKey::ColumnOrder,
            Write::ColumnTasks { column_id, .. } => SyncKey::Column(column_id.clone()),
            Write::TaskColor { task_id, .. } => SyncKey::TaskColor(task_id.clone()),
        }
    }

    async fn apply(&self, storage: &dyn Storage) -> Result<()> {
        match self {
            Write::ColumnOrder { board_id, order } => {
                storage.update_column_order(board_id, order).await
            }
            Write::ColumnTasks { column_id, task_ids } => {
                storage.update_column_task_ids(column_id, task_ids).await
            }
            Write::TaskColor { task_id, color } => storage.update_task_color(task_id, color).await,
        }
    }
}

enum Command {
    Write { write: Write, seq: u64 },
    Flush(oneshot::Sender<SyncReport>),
}

/// Queue of durable writes drained by one background worker
pub struct PersistenceSync {
    board_id: String,
    tx: mpsc::UnboundedSender<Command>,
    latest: Arc<DashMap<SyncKey, u64>>,
    next_seq: AtomicU64,
    worker: JoinHandle<SyncReport>,
}

impl PersistenceSync {
    /// Starts the worker on the current tokio runtime
    pub fn spawn(storage: Arc<dyn Storage>, board_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let latest = Arc::new(DashMap::new());
        let worker = tokio::spawn(run_worker(storage, rx, Arc::clone(&latest)));

        Self {
            board_id: board_id.into(),
            tx,
            latest,
            next_seq: AtomicU64::new(1),
            worker,
        }
    }

    /// Queues the writes of a plan
    pub fn enqueue(&self, plan: SyncPlan) {
        if let Some(order) = plan.column_order {
            self.push(Write::ColumnOrder {
                board_id: self.board_id.clone(),
                order,
            });
        }
        for (column_id, task_ids) in plan.columns {
            self.push(Write::ColumnTasks { column_id, task_ids });
        }
    }

    /// Queues a task color write
    pub fn enqueue_task_color(&self, task_id: TaskId, color: String) {
        self.push(Write::TaskColor { task_id, color });
    }

    fn push(&self, write: Write) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.latest.insert(write.key(), seq);
        tracing::debug!(?write, seq, "queued durable write");

        if self.tx.send(Command::Write { write, seq }).is_err() {
            tracing::error!(seq, "persistence worker stopped; write dropped");
        }
    }

    /// Waits until every write queued so far has been attempted
    pub async fn flush(&self) -> Result<SyncReport> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| KanbanError::SyncClosed)?;
        done.await.map_err(|_| KanbanError::SyncClosed)
    }

    /// Closes the queue, drains it and returns the final totals
    pub async fn shutdown(self) -> Result<SyncReport> {
        let Self { tx, worker, .. } = self;
        drop(tx);
        worker.await.map_err(|_| KanbanError::SyncClosed)
    }
}

async fn run_worker(
    storage: Arc<dyn Storage>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    latest: Arc<DashMap<SyncKey, u64>>,
) -> SyncReport {
    let mut report = SyncReport::default();

    while let Some(command) = rx.recv().await {
        let (write, seq) = match command {
            Command::Flush(reply) => {
                let _ = reply.send(report);
                continue;
            }
            Command::Write { write, seq } => (write, seq),
        };

        let key = write.key();
        let superseded = latest.get(&key).map_or(false, |newest| *newest > seq);
        if superseded {
            tracing::debug!(?key, seq, "skipping superseded write");
            report.skipped += 1;
            continue;
        }

        match write.apply(storage.as_ref()).await {
            Ok(()) => {
                report.applied += 1;
                latest.remove_if(&key, |_, newest| *newest == seq);
            }
            Err(e) => {
                tracing::warn!(?key, seq, error = %e, "durable write failed; keeping local state");
                report.failed += 1;
            }
        }
    }

    tracing::debug!(?report, "persistence worker finished");
    report
}
