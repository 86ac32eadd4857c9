use crate::{
    domain::{ColumnId, Comment, CommentId, Task, TaskId, DEFAULT_COLUMN_TITLES},
    error::{KanbanError, Result},
    storage::{
        record::{new_id, BoardSnapshot, StoredBoard},
        Storage,
    },
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

/// File-based storage: one JSON document per user board
pub struct FileStorage {
    root_path: PathBuf,
    default_columns: Vec<String>,
    // Board, column and task id -> user id of the owning document
    owners: DashMap<String, String>,
    // Serializes read-modify-write cycles on the board documents
    write_lock: Mutex<()>,
}

impl FileStorage {
    const LIFEOS_DIR: &'static str = ".lifeos";
    const BOARDS_DIR: &'static str = "boards";

    /// Creates a new FileStorage instance for the given data root
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self::with_default_columns(data_root, DEFAULT_COLUMN_TITLES)
    }

    pub fn with_default_columns<I, S>(data_root: impl AsRef<Path>, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root_path: data_root.as_ref().join(Self::LIFEOS_DIR),
            default_columns: titles.into_iter().map(Into::into).collect(),
            owners: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn board_file(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty()
            || user_id.contains(['/', '\\'])
            || user_id.starts_with('.')
        {
            return Err(KanbanError::StorageError(format!(
                "user id {:?} cannot be used as a file name",
                user_id
            )));
        }
        Ok(self.boards_dir().join(format!("{}.json", user_id)))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Creates the directory layout
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await
    }

    /// Checks if the directory layout exists
    pub async fn is_initialized(&self) -> bool {
        self.boards_dir().exists()
    }

    fn remember(&self, board: &StoredBoard) {
        self.owners.insert(board.id.clone(), board.user_id.clone());
        for column in &board.columns {
            self.owners
                .insert(column.id.to_string(), board.user_id.clone());
            for task in &column.tasks {
                self.owners.insert(task.id.to_string(), board.user_id.clone());
            }
        }
    }

    async fn read_board(&self, path: &Path) -> Result<StoredBoard> {
        let contents = fs::read_to_string(path).await?;
        let board: StoredBoard = serde_json::from_str(&contents)?;
        self.remember(&board);
        Ok(board)
    }

    async fn write_board(&self, board: &StoredBoard) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await?;

        let json = serde_json::to_string_pretty(board)?;
        fs::write(self.board_file(&board.user_id)?, json).await?;
        self.remember(board);
        Ok(())
    }

    /// Finds the user whose board holds a board, column or task id.
    ///
    /// Board files are only scanned when the id has not been seen yet; an
    /// unreadable file is skipped so it only affects its own user.
    async fn owner_of(&self, id: &str) -> Result<Option<String>> {
        let known = self.owners.get(id).map(|user| user.value().clone());
        if known.is_some() {
            return Ok(known);
        }

        let boards_dir = self.boards_dir();
        if !boards_dir.exists() {
            return Ok(None);
        }

        let mut entries = fs::read_dir(&boards_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match self.read_board(&path).await {
                Ok(board) if board.owns(id) => return Ok(Some(board.user_id)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable board file")
                }
            }
        }
        Ok(None)
    }

    /// Loads the board owning `id`, applies `apply` and writes it back
    async fn update_board<T, F>(&self, id: &str, missing: KanbanError, apply: F) -> Result<T>
    where
        F: FnOnce(&mut StoredBoard) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;

        let user_id = self.owner_of(id).await?.ok_or(missing)?;
        let mut board = self.read_board(&self.board_file(&user_id)?).await?;
        let result = apply(&mut board)?;
        self.write_board(&board).await?;
        Ok(result)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_board(&self, user_id: &str) -> Result<BoardSnapshot> {
        let _guard = self.write_lock.lock().await;

        let path = self.board_file(user_id)?;
        if path.exists() {
            return self.read_board(&path).await?.snapshot();
        }

        tracing::info!(user_id, path = %path.display(), "creating default board");
        let board = StoredBoard::bootstrap(user_id, self.default_columns.as_slice());
        self.write_board(&board).await?;
        board.snapshot()
    }

    async fn update_column_order(&self, board_id: &str, order: &[ColumnId]) -> Result<()> {
        self.update_board(
            board_id,
            KanbanError::BoardNotFound(board_id.to_string()),
            |b| b.set_column_order(order),
        )
        .await
    }

    async fn update_column_task_ids(&self, column_id: &ColumnId, task_ids: &[TaskId]) -> Result<()> {
        self.update_board(
            column_id.as_str(),
            KanbanError::ColumnNotFound(column_id.to_string()),
            |b| b.set_column_task_ids(column_id.as_str(), task_ids),
        )
        .await
    }

    async fn create_task(&self, column_id: &ColumnId, content: &str) -> Result<Task> {
        let task = Task::new(TaskId::new(new_id()), content.to_string());
        self.update_board(
            column_id.as_str(),
            KanbanError::ColumnNotFound(column_id.to_string()),
            |b| b.insert_task(column_id.as_str(), task.clone()),
        )
        .await?;
        Ok(task)
    }

    async fn add_comment(&self, task_id: &TaskId, content: &str) -> Result<Comment> {
        let comment = Comment::new(CommentId::new(new_id()), content.to_string());
        self.update_board(
            task_id.as_str(),
            KanbanError::TaskNotFound(task_id.to_string()),
            |b| b.push_comment(task_id.as_str(), comment.clone()),
        )
        .await?;
        Ok(comment)
    }

    async fn update_task_color(&self, task_id: &TaskId, color: &str) -> Result<()> {
        self.update_board(
            task_id.as_str(),
            KanbanError::TaskNotFound(task_id.to_string()),
            |b| b.set_task_color(task_id.as_str(), color),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        assert!(storage.boards_dir().exists());
    }

    #[tokio::test]
    async fn test_get_board_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let snapshot = storage.get_board("user-1").await.unwrap();
        assert!(storage.board_file("user-1").unwrap().exists());
        assert_eq!(snapshot.board.columns.len(), 3);

        let again = storage.get_board("user-1").await.unwrap();
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn test_board_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let snapshot = storage.get_board("user-1").await.unwrap();
        let todo = snapshot.board.column_order[0].clone();
        let done = snapshot.board.column_order[2].clone();

        let task = storage.create_task(&todo, "Write tests").await.unwrap();
        storage.update_column_task_ids(&todo, &[]).await.unwrap();
        storage
            .update_column_task_ids(&done, &[task.id.clone()])
            .await
            .unwrap();
        storage.add_comment(&task.id, "halfway").await.unwrap();
        storage.update_task_color(&task.id, "bg-yellow-100").await.unwrap();

        let reopened = FileStorage::new(temp_dir.path());
        let board = reopened.get_board("user-1").await.unwrap().board;

        assert!(board.column(todo.as_str()).unwrap().task_ids.is_empty());
        assert_eq!(board.column(done.as_str()).unwrap().task_ids, vec![task.id.clone()]);
        let stored = board.task(task.id.as_str()).unwrap();
        assert_eq!(stored.color, "bg-yellow-100");
        assert_eq!(stored.comments.len(), 1);
        assert_eq!(stored.comments[0].content, "halfway");
    }

    #[tokio::test]
    async fn test_column_order_update() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let snapshot = storage.get_board("user-1").await.unwrap();

        let mut order = snapshot.board.column_order.to_vec();
        order.rotate_left(1);
        storage
            .update_column_order(&snapshot.board_id, &order)
            .await
            .unwrap();

        let board = storage.get_board("user-1").await.unwrap().board;
        assert_eq!(board.column_order.as_slice(), order.as_slice());
    }

    #[tokio::test]
    async fn test_boards_are_per_user() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let a = storage.get_board("alice").await.unwrap();
        let b = storage.get_board("bob").await.unwrap();
        let column = a.board.column_order[0].clone();

        storage.create_task(&column, "alice's task").await.unwrap();

        assert_eq!(storage.get_board("alice").await.unwrap().board.tasks.len(), 1);
        assert_eq!(storage.get_board("bob").await.unwrap().board, b.board);
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.get_board("user-1").await.unwrap();

        let result = storage.create_task(&ColumnId::new("nope"), "x").await;
        assert!(matches!(result, Err(KanbanError::ColumnNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_like_user_ids() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(storage.get_board("../escape").await.is_err());
        assert!(storage.get_board("").await.is_err());
    }

    #[tokio::test]
    async fn test_writes_after_reopen_find_their_board() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.get_board("alice").await.unwrap();
        let bob = storage.get_board("bob").await.unwrap();
        let column = bob.board.column_order[1].clone();

        let reopened = FileStorage::new(temp_dir.path());
        let task = reopened.create_task(&column, "bob's task").await.unwrap();
        reopened.update_task_color(&task.id, "bg-red-100").await.unwrap();

        let board = reopened.get_board("bob").await.unwrap().board;
        assert_eq!(board.column(column.as_str()).unwrap().task_ids, vec![task.id.clone()]);
        assert_eq!(board.task(task.id.as_str()).unwrap().color, "bg-red-100");
        assert!(reopened.get_board("alice").await.unwrap().board.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_board_only_affects_its_owner() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let alice = storage.get_board("alice").await.unwrap();
        fs::write(storage.board_file("mallory").unwrap(), "{ not json")
            .await
            .unwrap();

        let reopened = FileStorage::new(temp_dir.path());
        let column = alice.board.column_order[0].clone();
        reopened.create_task(&column, "still works").await.unwrap();
        reopened
            .update_column_order(&alice.board_id, &alice.board.column_order)
            .await
            .unwrap();

        assert!(reopened.get_board("mallory").await.is_err());
        assert_eq!(reopened.get_board("alice").await.unwrap().board.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_task_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let snapshot = storage.get_board("user-1").await.unwrap();
        let column = snapshot.board.column_order[0].clone();

        let result = storage
            .update_column_task_ids(&column, &[TaskId::new("ghost")])
            .await;
        assert!(matches!(result, Err(KanbanError::TaskNotFound(_))));
        assert_eq!(storage.get_board("user-1").await.unwrap(), snapshot);
    }
}
