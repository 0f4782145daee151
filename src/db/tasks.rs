//! Task CRUD and priority reconciliation.

use super::history::record_status_change;
use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{NewTask, Priority, Task, TaskCounts, TaskFilter, TaskPatch, TaskStatus};
use anyhow::Result;
use rusqlite::{Connection, Row, params, params_from_iter};

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        completed: row.get("completed")?,
        status: TaskStatus::from_str(&status).unwrap_or_default(),
        deleted: row.get("deleted")?,
        created_date: row.get("created_date")?,
    })
}

/// Internal helper to get a live task using an existing connection.
/// A deleted task or another user's task reads as absent.
fn get_task_internal(conn: &Connection, user_id: i64, task_id: i64) -> Result<Option<Task>> {
    let mut stmt =
        conn.prepare("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2 AND deleted = 0")?;

    let result = stmt.query_row(params![task_id, user_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Shift a contiguous block of conflicting priorities up by one slot.
///
/// Scans the user's other incomplete, non-deleted tasks with priority at or
/// above the target, ascending. Each task in the contiguous run starting at
/// the target gets priority + 1; the scan stops at the first gap. Only
/// forward collisions are resolved; moving a task down leaves the old slot
/// vacant.
///
/// Must run inside the same transaction as the save it makes room for.
pub(crate) fn reconcile_priorities(
    conn: &Connection,
    user_id: i64,
    target: Priority,
    exclude_id: Option<i64>,
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT id, priority FROM tasks
         WHERE user_id = ?1 AND deleted = 0 AND completed = 0
           AND priority >= ?2 AND id != ?3
         ORDER BY priority ASC",
    )?;

    let rows: Vec<(i64, Priority)> = stmt
        .query_map(params![user_id, target, exclude_id.unwrap_or(-1)], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut current = target;
    let mut shifted: Vec<(i64, Priority)> = Vec::new();
    for (id, priority) in rows {
        if priority > current {
            break;
        }
        current = priority + 1;
        shifted.push((id, current));
    }

    for (id, priority) in &shifted {
        conn.execute(
            "UPDATE tasks SET priority = ?1 WHERE id = ?2",
            params![priority, id],
        )?;
    }

    Ok(shifted.len())
}

impl Database {
    /// Create a task, reconciling priorities in the same transaction.
    pub fn create_task(&self, user_id: i64, input: NewTask) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(ApiError::invalid_value("title", "title must not be blank").into());
        }

        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            reconcile_priorities(&tx, user_id, input.priority, None)?;

            tx.execute(
                "INSERT INTO tasks (user_id, title, description, priority, completed, status, deleted, created_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                params![
                    user_id,
                    input.title,
                    input.description,
                    input.priority,
                    input.completed,
                    input.status.as_str(),
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.commit()?;

            Ok(Task {
                id,
                user_id,
                title: input.title,
                description: input.description,
                priority: input.priority,
                completed: input.completed,
                status: input.status,
                deleted: false,
                created_date: now,
            })
        })
    }

    /// Get a live task by ID, scoped to its owner.
    pub fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, user_id, task_id))
    }

    /// List a user's live tasks, ordered by priority.
    pub fn list_tasks(&self, user_id: i64, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks WHERE user_id = ?1 AND deleted = 0");
            let mut values: Vec<rusqlite::types::Value> = vec![user_id.into()];

            if let Some(title) = &filter.title {
                values.push(format!("%{}%", title.to_lowercase()).into());
                sql.push_str(&format!(" AND LOWER(title) LIKE ?{}", values.len()));
            }
            if let Some(status) = filter.status {
                values.push(status.as_str().to_string().into());
                sql.push_str(&format!(" AND status = ?{}", values.len()));
            }
            if let Some(completed) = filter.completed {
                values.push(completed.into());
                sql.push_str(&format!(" AND completed = ?{}", values.len()));
            }

            sql.push_str(" ORDER BY priority ASC, id ASC");

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values), parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(tasks)
        })
    }

    /// Apply a partial update to a task.
    ///
    /// `record_history` marks the API path: a status change there appends one
    /// row to the status history before the new status is persisted. The form
    /// path passes `false` and never writes history.
    ///
    /// Returns `None` if the task is missing, deleted, or owned by someone else.
    pub fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        patch: TaskPatch,
        record_history: bool,
    ) -> Result<Option<Task>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(existing) = get_task_internal(&tx, user_id, task_id)? else {
                return Ok(None);
            };

            let title = patch.title.unwrap_or(existing.title);
            if title.trim().is_empty() {
                return Err(ApiError::invalid_value("title", "title must not be blank").into());
            }
            let description = patch.description.unwrap_or(existing.description);
            let completed = patch.completed.unwrap_or(existing.completed);
            let status = patch.status.unwrap_or(existing.status);
            let priority = patch.priority.unwrap_or(existing.priority);

            if record_history && status != existing.status {
                record_status_change(&tx, task_id, user_id, existing.status, status)?;
            }

            // Only a priority-bearing save triggers reconciliation.
            if patch.priority.is_some() {
                reconcile_priorities(&tx, user_id, priority, Some(task_id))?;
            }

            tx.execute(
                "UPDATE tasks
                 SET title = ?1, description = ?2, priority = ?3, completed = ?4, status = ?5
                 WHERE id = ?6",
                params![
                    title,
                    description,
                    priority,
                    completed,
                    status.as_str(),
                    task_id,
                ],
            )?;

            tx.commit()?;

            Ok(Some(Task {
                id: task_id,
                user_id,
                title,
                description,
                priority,
                completed,
                status,
                deleted: false,
                created_date: existing.created_date,
            }))
        })
    }

    /// Flip a task's completed flag. Returns whether a row was touched;
    /// a foreign or deleted task is a silent no-op.
    pub fn toggle_complete(&self, user_id: i64, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET completed = 1 - completed
                 WHERE id = ?1 AND user_id = ?2 AND deleted = 0",
                params![task_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Soft-delete a task (UI path). The row stays behind, hidden everywhere.
    pub fn soft_delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET deleted = 1
                 WHERE id = ?1 AND user_id = ?2 AND deleted = 0",
                params![task_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Physically remove a task (API path).
    pub fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2 AND deleted = 0",
                params![task_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Total and completed counts for the task list header.
    pub fn task_counts(&self, user_id: i64) -> Result<TaskCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(completed), 0)
                 FROM tasks WHERE user_id = ?1 AND deleted = 0",
                params![user_id],
                |row| {
                    Ok(TaskCounts {
                        total: row.get(0)?,
                        completed: row.get(1)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }

    /// Non-deleted task counts per status, in display order. Zero counts included.
    pub fn status_counts(&self, user_id: i64) -> Result<Vec<(TaskStatus, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM tasks
                 WHERE user_id = ?1 AND deleted = 0
                 GROUP BY status",
            )?;

            let mut by_status: std::collections::HashMap<String, i64> = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get(1)?))
                })?
                .collect::<Result<_, _>>()?;

            Ok(TaskStatus::ALL
                .iter()
                .map(|s| (*s, by_status.remove(s.as_str()).unwrap_or(0)))
                .collect())
        })
    }
}
