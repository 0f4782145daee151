//! Append-only status transition log.

use super::{Database, now_ms};
use crate::types::{HistoryFilter, TaskStatus, TaskStatusChange};
use anyhow::Result;
use rusqlite::{Connection, Row, params, params_from_iter};

fn parse_change_row(row: &Row) -> rusqlite::Result<TaskStatusChange> {
    let original: String = row.get("original_status")?;
    let updated: String = row.get("updated_status")?;

    Ok(TaskStatusChange {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        original_status: TaskStatus::from_str(&original).unwrap_or_default(),
        updated_status: TaskStatus::from_str(&updated).unwrap_or_default(),
        changed_date: row.get("changed_date")?,
    })
}

/// Append one history record for an observed status transition.
///
/// Called from the API update path only, inside the update transaction and
/// before the new status is persisted. Records are never updated or deleted.
pub(crate) fn record_status_change(
    conn: &Connection,
    task_id: i64,
    user_id: i64,
    original: TaskStatus,
    updated: TaskStatus,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_status_changes (task_id, user_id, original_status, updated_status, changed_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            task_id,
            user_id,
            original.as_str(),
            updated.as_str(),
            now_ms(),
        ],
    )?;
    Ok(())
}

impl Database {
    /// History for one task, oldest first. Deleted and foreign tasks read as
    /// having no history.
    pub fn task_history(&self, user_id: i64, task_id: i64) -> Result<Vec<TaskStatusChange>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.task_id, c.user_id, c.original_status, c.updated_status, c.changed_date
                 FROM task_status_changes c
                 INNER JOIN tasks t ON t.id = c.task_id
                 WHERE c.task_id = ?1 AND t.user_id = ?2 AND t.deleted = 0
                 ORDER BY c.id ASC",
            )?;

            let changes = stmt
                .query_map(params![task_id, user_id], parse_change_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(changes)
        })
    }

    /// Account-wide history across all of a user's live tasks.
    pub fn list_history(
        &self,
        user_id: i64,
        filter: &HistoryFilter,
    ) -> Result<Vec<TaskStatusChange>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT c.id, c.task_id, c.user_id, c.original_status, c.updated_status, c.changed_date
                 FROM task_status_changes c
                 INNER JOIN tasks t ON t.id = c.task_id
                 WHERE t.user_id = ?1 AND t.deleted = 0",
            );
            let mut values: Vec<rusqlite::types::Value> = vec![user_id.into()];

            if let Some(since) = filter.changed_since {
                values.push(since.into());
                sql.push_str(&format!(" AND c.changed_date >= ?{}", values.len()));
            }
            if let Some(original) = filter.original_status {
                values.push(original.as_str().to_string().into());
                sql.push_str(&format!(" AND c.original_status = ?{}", values.len()));
            }
            if let Some(updated) = filter.updated_status {
                values.push(updated.as_str().to_string().into());
                sql.push_str(&format!(" AND c.updated_status = ?{}", values.len()));
            }

            sql.push_str(" ORDER BY c.id ASC");

            let mut stmt = conn.prepare(&sql)?;
            let changes = stmt
                .query_map(params_from_iter(values), parse_change_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(changes)
        })
    }
}
