//! Per-user reminder preferences.

use super::users::get_user_internal;
use super::{Database, now_ms};
use crate::types::{User, UserPreferences};
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_prefs_row(row: &Row) -> rusqlite::Result<UserPreferences> {
    Ok(UserPreferences {
        user_id: row.get("user_id")?,
        reminder_enabled: row.get("reminder_enabled")?,
        reminder_time: row.get("reminder_time")?,
        last_sent: row.get("last_sent")?,
    })
}

impl Database {
    /// Fetch a user's preferences, creating the row with defaults on first
    /// access (the preferences view is the lazy creation point).
    pub fn get_or_create_preferences(&self, user_id: i64) -> Result<UserPreferences> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO user_preferences (user_id) VALUES (?1)",
                params![user_id],
            )?;

            let prefs = conn.query_row(
                "SELECT user_id, reminder_enabled, reminder_time, last_sent
                 FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                parse_prefs_row,
            )?;
            Ok(prefs)
        })
    }

    /// Update reminder settings. last_sent is untouched here; only the
    /// scheduler advances it.
    pub fn update_preferences(
        &self,
        user_id: i64,
        reminder_enabled: bool,
        reminder_time: &str,
    ) -> Result<UserPreferences> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_preferences (user_id, reminder_enabled, reminder_time)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET reminder_enabled = ?2, reminder_time = ?3",
                params![user_id, reminder_enabled, reminder_time],
            )?;

            let prefs = conn.query_row(
                "SELECT user_id, reminder_enabled, reminder_time, last_sent
                 FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                parse_prefs_row,
            )?;
            Ok(prefs)
        })
    }

    /// Users due for a reminder: enabled, and last_sent either absent or at
    /// least `resend_after_ms` old as of `now`.
    pub fn due_reminders(
        &self,
        now: i64,
        resend_after_ms: i64,
    ) -> Result<Vec<(User, UserPreferences)>> {
        let cutoff = now - resend_after_ms;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, reminder_enabled, reminder_time, last_sent
                 FROM user_preferences
                 WHERE reminder_enabled = 1
                   AND (last_sent IS NULL OR last_sent <= ?1)
                 ORDER BY user_id ASC",
            )?;

            let prefs: Vec<UserPreferences> = stmt
                .query_map(params![cutoff], parse_prefs_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut due = Vec::with_capacity(prefs.len());
            for p in prefs {
                // A preferences row without its user should not happen
                // (FK cascade), but skip rather than fail the batch.
                if let Some(user) = get_user_internal(conn, p.user_id)? {
                    due.push((user, p));
                }
            }

            Ok(due)
        })
    }

    /// Record a successful send. Called once per delivered reminder.
    pub fn mark_reminder_sent(&self, user_id: i64, sent_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE user_preferences SET last_sent = ?1 WHERE user_id = ?2",
                params![sent_at, user_id],
            )?;
            Ok(())
        })
    }
}

/// Validate an "HH:MM:SS" reminder time string.
pub fn parse_reminder_time(s: &str) -> Option<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(s, "%H:%M:%S").ok()
}
