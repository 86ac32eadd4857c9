use crate::{
    domain::{ColumnId, Comment, CommentId, Task, TaskId, DEFAULT_COLUMN_TITLES},
    error::{KanbanError, Result},
    storage::{
        record::{new_id, BoardSnapshot, StoredBoard, StoredColumn},
        Storage,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    column_order TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS columns (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id),
    title TEXT NOT NULL,
    task_ids TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    column_id TEXT NOT NULL REFERENCES columns(id),
    content TEXT NOT NULL,
    color TEXT NOT NULL,
    seq INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    seq INTEGER NOT NULL
);
";

/// SQLite-based storage backend. Id lists are stored as JSON arrays.
///
/// Queries run on tokio's blocking pool.
pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
    default_columns: Vec<String>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn new(database_path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(database_path)?)
    }

    /// Opens a private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            default_columns: DEFAULT_COLUMN_TITLES.iter().map(|t| t.to_string()).collect(),
        })
    }

    pub fn with_default_columns<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_columns = titles.into_iter().map(Into::into).collect();
        self
    }

    /// Runs `op` against the connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut conn = connection
                .lock()
                .map_err(|_| KanbanError::StorageError("database mutex poisoned".to_string()))?;
            op(&mut conn)
        })
        .await
        .map_err(|e| KanbanError::StorageError(format!("database task failed: {}", e)))?
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

fn insert_board(conn: &Connection, board: &StoredBoard) -> Result<()> {
    conn.execute(
        "INSERT INTO boards (id, user_id, column_order) VALUES (?1, ?2, ?3)",
        params![board.id, board.user_id, to_json(&board.column_order)?],
    )?;
    for column in &board.columns {
        conn.execute(
            "INSERT INTO columns (id, board_id, title, task_ids) VALUES (?1, ?2, ?3, ?4)",
            params![
                column.id.as_str(),
                board.id,
                column.title,
                to_json(&column.task_ids)?
            ],
        )?;
    }
    Ok(())
}

fn load_board(conn: &Connection, user_id: &str) -> Result<Option<StoredBoard>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, column_order FROM boards WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((board_id, column_order)) = row else {
        return Ok(None);
    };

    let mut column_stmt =
        conn.prepare("SELECT id, title, task_ids FROM columns WHERE board_id = ?1 ORDER BY rowid")?;
    let column_rows = column_stmt
        .query_map(params![board_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut task_stmt =
        conn.prepare("SELECT id, content, color FROM tasks WHERE column_id = ?1 ORDER BY seq")?;
    let mut comment_stmt = conn.prepare(
        "SELECT id, content, created_at FROM comments WHERE task_id = ?1 ORDER BY seq",
    )?;

    let mut columns = Vec::with_capacity(column_rows.len());
    for (id, title, task_ids) in column_rows {
        let task_rows = task_stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tasks = Vec::with_capacity(task_rows.len());
        for (task_id, content, color) in task_rows {
            let comment_rows = comment_stmt
                .query_map(params![task_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut comments = Vec::with_capacity(comment_rows.len());
            for (comment_id, content, created_at) in comment_rows {
                comments.push(Comment {
                    id: CommentId::new(comment_id),
                    content,
                    created_at: parse_timestamp(&created_at)?,
                });
            }

            tasks.push(Task {
                id: TaskId::new(task_id),
                content,
                color,
                comments,
            });
        }

        columns.push(StoredColumn {
            id: ColumnId::new(id),
            title,
            task_ids: from_json(&task_ids)?,
            tasks,
        });
    }

    Ok(Some(StoredBoard {
        id: board_id,
        user_id: user_id.to_string(),
        column_order: from_json(&column_order)?,
        columns,
    }))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| KanbanError::StorageError(format!("invalid timestamp {:?}: {}", text, e)))
}

fn next_seq(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {}", table);
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

fn column_task_ids(conn: &Connection, column_id: &str) -> Result<Vec<TaskId>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT task_ids FROM columns WHERE id = ?1",
            params![column_id],
            |row| row.get(0),
        )
        .optional()?;
    match text {
        Some(text) => from_json(&text),
        None => Err(KanbanError::ColumnNotFound(column_id.to_string())),
    }
}

fn board_owner(conn: &Connection, sql: &str, id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(sql, params![id], |row| row.get(0))
        .optional()?)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_board(&self, user_id: &str) -> Result<BoardSnapshot> {
        let user_id = user_id.to_string();
        let default_columns = self.default_columns.clone();
        self.run(move |conn| {
            if let Some(board) = load_board(conn, &user_id)? {
                return board.snapshot();
            }

            tracing::info!(user_id = %user_id, "creating default board");
            let board = StoredBoard::bootstrap(&user_id, default_columns.as_slice());
            let tx = conn.transaction()?;
            insert_board(&tx, &board)?;
            tx.commit()?;
            board.snapshot()
        })
        .await
    }

    async fn update_column_order(&self, board_id: &str, order: &[ColumnId]) -> Result<()> {
        let board_id = board_id.to_string();
        let order = order.to_vec();
        self.run(move |conn| {
            let user_id = board_owner(conn, "SELECT user_id FROM boards WHERE id = ?1", &board_id)?
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.clone()))?;

            // Validate against the stored columns before writing.
            let mut board = load_board(conn, &user_id)?
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.clone()))?;
            board.set_column_order(&order)?;

            conn.execute(
                "UPDATE boards SET column_order = ?1 WHERE id = ?2",
                params![to_json(&board.column_order)?, board_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_column_task_ids(&self, column_id: &ColumnId, task_ids: &[TaskId]) -> Result<()> {
        let column_id = column_id.clone();
        let task_ids = task_ids.to_vec();
        self.run(move |conn| {
            let user_id = board_owner(
                conn,
                "SELECT b.user_id FROM boards b JOIN columns c ON c.board_id = b.id WHERE c.id = ?1",
                column_id.as_str(),
            )?
            .ok_or_else(|| KanbanError::ColumnNotFound(column_id.to_string()))?;

            // The ids must name tasks of the same board.
            let mut board = load_board(conn, &user_id)?
                .ok_or_else(|| KanbanError::ColumnNotFound(column_id.to_string()))?;
            board.set_column_task_ids(column_id.as_str(), &task_ids)?;

            conn.execute(
                "UPDATE columns SET task_ids = ?1 WHERE id = ?2",
                params![to_json(&task_ids)?, column_id.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_task(&self, column_id: &ColumnId, content: &str) -> Result<Task> {
        let column_id = column_id.clone();
        let task = Task::new(TaskId::new(new_id()), content.to_string());
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let mut task_ids = column_task_ids(&tx, column_id.as_str())?;
            let seq = next_seq(&tx, "tasks")?;
            tx.execute(
                "INSERT INTO tasks (id, column_id, content, color, seq) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![task.id.as_str(), column_id.as_str(), task.content, task.color, seq],
            )?;
            task_ids.insert(0, task.id.clone());
            tx.execute(
                "UPDATE columns SET task_ids = ?1 WHERE id = ?2",
                params![to_json(&task_ids)?, column_id.as_str()],
            )?;
            tx.commit()?;

            Ok(task)
        })
        .await
    }

    async fn add_comment(&self, task_id: &TaskId, content: &str) -> Result<Comment> {
        let task_id = task_id.clone();
        let comment = Comment::new(CommentId::new(new_id()), content.to_string());
        self.run(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM tasks WHERE id = ?1",
                    params![task_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(KanbanError::TaskNotFound(task_id.to_string()));
            }

            let seq = next_seq(conn, "comments")?;
            conn.execute(
                "INSERT INTO comments (id, task_id, content, created_at, seq) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.id.as_str(),
                    task_id.as_str(),
                    comment.content,
                    comment.created_at.to_rfc3339(),
                    seq
                ],
            )?;
            Ok(comment)
        })
        .await
    }

    async fn update_task_color(&self, task_id: &TaskId, color: &str) -> Result<()> {
        let task_id = task_id.clone();
        let color = color.to_string();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE tasks SET color = ?1 WHERE id = ?2",
                params![color, task_id.as_str()],
            )?;
            if updated == 0 {
                return Err(KanbanError::TaskNotFound(task_id.to_string()));
            }
            Ok(())
        })
        .await
    }
}
