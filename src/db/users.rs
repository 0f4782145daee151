//! User accounts and session tokens.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::User;
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
    })
}

/// Hash a password with a fresh random salt. Format: `{salt_hex}${digest_hex}`.
fn hash_password(password: &str) -> String {
    let salt = hex::encode(Uuid::new_v4().as_bytes());
    let digest = salted_digest(&salt, password);
    format!("{}${}", salt, digest)
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant format check, then digest comparison.
fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => salted_digest(salt, password) == digest,
        None => false,
    }
}

/// Internal helper to get a user using an existing connection.
pub(crate) fn get_user_internal(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let mut stmt =
        conn.prepare("SELECT id, username, email, created_at FROM users WHERE id = ?1")?;

    let result = stmt.query_row(params![user_id], parse_user_row);

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a new user account.
    pub fn create_user(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(ApiError::missing_field("username").into());
        }
        if password.is_empty() {
            return Err(ApiError::missing_field("password").into());
        }

        let now = now_ms();
        let password_hash = hash_password(password);

        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if taken {
                return Err(ApiError::username_taken(username).into());
            }

            conn.execute(
                "INSERT INTO users (username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![username, email, password_hash, now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Check a username/password pair. Returns the user on success.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE username = ?1",
                params![username],
                |row| {
                    let user = parse_user_row(row)?;
                    let hash: String = row.get("password_hash")?;
                    Ok((user, hash))
                },
            );

            match result {
                Ok((user, hash)) if verify_password(&hash, password) => Ok(Some(user)),
                Ok(_) => Ok(None),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Create a session for a user, returning the opaque token.
    pub fn create_session(&self, user_id: i64, ttl_hours: i64) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let now = now_ms();
        let expires_at = now + ttl_hours * 3_600_000;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now, expires_at],
            )?;
            Ok(())
        })?;

        Ok(token)
    }

    /// Resolve a session token to its user, if the session is still live.
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let now = now_ms();

        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT u.id, u.username, u.email, u.created_at
                 FROM sessions s
                 INNER JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1 AND s.expires_at > ?2",
                params![token, now],
                parse_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Delete a session (logout). Unknown tokens are ignored.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
    }
}
