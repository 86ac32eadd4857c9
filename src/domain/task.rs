use crate::domain::ids::{CommentId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Color tag given to tasks that have never been recolored
pub const DEFAULT_COLOR: &str = "bg-white";

/// Color tags offered by the board UI. Storage accepts any tag.
pub const PALETTE: [&str; 8] = [
    "bg-white",
    "bg-red-100",
    "bg-orange-100",
    "bg-yellow-100",
    "bg-green-100",
    "bg-blue-100",
    "bg-purple-100",
    "bg-pink-100",
];

/// A comment in a task's thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(id: CommentId, content: String) -> Self {
        Self {
            id,
            content,
            created_at: Utc::now(),
        }
    }
}

/// A kanban task.
///
/// The task never records which column holds it; ownership is whichever
/// column lists its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: String,
    pub color: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Task {
    /// Creates a task with the default color and no comments
    pub fn new(id: TaskId, content: String) -> Self {
        Self {
            id,
            content,
            color: DEFAULT_COLOR.to_string(),
            comments: Vec::new(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Appends a comment to the end of the thread
    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Checks if the color is one of the UI palette tags
    pub fn has_palette_color(&self) -> bool {
        PALETTE.contains(&self.color.as_str())
    }
}
