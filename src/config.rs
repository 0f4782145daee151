//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,
}

/// Web server and storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Session lifetime in hours.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// How often the scheduler wakes up, in seconds.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// A user is due again once last_sent is older than this many hours.
    #[serde(default = "default_resend_after")]
    pub resend_after_hours: i64,

    /// From address for summary emails.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            resend_after_hours: default_resend_after(),
            from_address: default_from_address(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".taskdeck/taskdeck.db")
}

fn default_session_ttl() -> i64 {
    24 * 14 // two weeks
}

fn default_interval() -> u64 {
    30
}

fn default_resend_after() -> i64 {
    24
}

fn default_from_address() -> String {
    "tasks@taskdeck.org".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location or return defaults.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(".taskdeck/config.yaml") {
            return config;
        }

        // Fall back to environment variables
        let mut config = Self::default();

        if let Ok(db_path) = std::env::var("TASKDECK_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(port) = std::env::var("TASKDECK_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }

        if let Ok(interval) = std::env::var("TASKDECK_REMINDER_INTERVAL") {
            if let Ok(interval) = interval.parse() {
                config.reminders.interval_seconds = interval;
            }
        }

        config
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
