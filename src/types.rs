//! Core types for the task tracker.

use serde::{Deserialize, Serialize};

/// Task priority as an integer (lower = more urgent).
/// Priorities are kept collision-free among a user's incomplete,
/// non-deleted tasks by the reconciliation pass in [`crate::db`].
pub type Priority = i32;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// All statuses in display order (used for the reminder summary).
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// Lowercase label used in email summaries ("pending", "in_progress", ...).
    pub fn label(&self) -> String {
        self.as_str().to_lowercase()
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// A registered user. The password hash never leaves the db layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

/// A task owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub completed: bool,
    pub status: TaskStatus,
    pub deleted: bool,
    pub created_date: i64,
}

/// Fields for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub status: TaskStatus,
}

/// Partial update for a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub status: Option<TaskStatus>,
}

/// One recorded status transition. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusChange {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub original_status: TaskStatus,
    pub updated_status: TaskStatus,
    pub changed_date: i64,
}

/// Per-user reminder settings (one-to-one with users).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: i64,
    pub reminder_enabled: bool,
    /// Preferred time of day for reminders, "HH:MM:SS".
    pub reminder_time: String,
    /// Millisecond timestamp of the last successful send, if any.
    pub last_sent: Option<i64>,
}

/// Filters for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub completed: Option<bool>,
}

/// Filters for the account-wide history listing.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only changes at or after this millisecond timestamp.
    pub changed_since: Option<i64>,
    pub original_status: Option<TaskStatus>,
    pub updated_status: Option<TaskStatus>,
}

/// Completed/total counts shown in the task list header.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskCounts {
    pub total: i64,
    pub completed: i64,
}
