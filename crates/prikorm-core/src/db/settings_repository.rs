//! Settings repository implementation
//!
//! Local persisted configuration: plain scalar values keyed by name.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::state::{SyncState, SyncStatus};

/// Setting names
pub mod keys {
    pub const FAMILY_CODE: &str = "sync.family_code";
    pub const REMOTE_UPDATED_AT: &str = "sync.remote_updated_at";
    pub const LAST_PUSH_AT: &str = "sync.last_push_at";
    pub const LAST_PULL_AT: &str = "sync.last_pull_at";
    pub const LAST_ERROR: &str = "sync.last_error";
    pub const STATUS: &str = "sync.status";
    pub const START_DATE: &str = "plan.start_date";
    pub const SELECTED_DATE: &str = "plan.selected_date";
}

/// Trait for settings storage operations
pub trait SettingsRepository {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Set `key` to `value`, or remove it when `value` is `None`
    fn set_optional(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.set(key, value),
            None => self.remove(key),
        }
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key)?.and_then(|value| value.trim().parse().ok()))
    }

    fn get_date(&self, key: &str) -> Result<Option<NaiveDate>> {
        Ok(self.get(key)?.and_then(|value| value.trim().parse().ok()))
    }

    fn family_code(&self) -> Result<Option<String>> {
        Ok(self
            .get(keys::FAMILY_CODE)?
            .filter(|code| !code.trim().is_empty()))
    }

    /// Load the persisted observable sync fields
    fn load_sync_status(&self) -> Result<SyncStatus> {
        Ok(SyncStatus {
            state: self
                .get(keys::STATUS)?
                .and_then(|value| value.parse().ok())
                .unwrap_or(SyncState::Idle),
            remote_updated_at: self.get_i64(keys::REMOTE_UPDATED_AT)?,
            last_push_at: self.get_i64(keys::LAST_PUSH_AT)?,
            last_pull_at: self.get_i64(keys::LAST_PULL_AT)?,
            last_error: self.get(keys::LAST_ERROR)?,
        })
    }

    /// Persist the observable sync fields
    fn save_sync_status(&self, status: &SyncStatus) -> Result<()> {
        self.set(keys::STATUS, status.state.as_str())?;
        self.set_optional(
            keys::REMOTE_UPDATED_AT,
            status.remote_updated_at.map(|ts| ts.to_string()).as_deref(),
        )?;
        self.set_optional(
            keys::LAST_PUSH_AT,
            status.last_push_at.map(|ts| ts.to_string()).as_deref(),
        )?;
        self.set_optional(
            keys::LAST_PULL_AT,
            status.last_pull_at.map(|ts| ts.to_string()).as_deref(),
        )?;
        self.set_optional(keys::LAST_ERROR, status.last_error.as_deref())
    }
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", params![key])?;
        Ok(())
    }
}
