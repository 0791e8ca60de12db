//! Feeding log repository implementation

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{LogEntry, LogKey};

/// Trait for feeding log storage operations
pub trait LogRepository {
    /// Get an entry by its natural key
    fn get(&self, key: &LogKey) -> Result<Option<LogEntry>>;

    /// List every entry in insertion order
    fn list(&self) -> Result<Vec<LogEntry>>;

    /// List the entries recorded for one plan day on one calendar date
    fn list_for_day(&self, day_index: u32, date: NaiveDate) -> Result<Vec<LogEntry>>;

    /// Insert a new entry, keeping its timestamp
    fn insert(&self, entry: &LogEntry) -> Result<()>;

    /// Replace every field of the entry sharing `entry`'s natural key.
    ///
    /// Returns `false` when no such entry exists.
    fn overwrite(&self, entry: &LogEntry) -> Result<bool>;

    /// Hard delete by natural key. Returns `false` when nothing was deleted.
    fn delete(&self, key: &LogKey) -> Result<bool>;
}

/// `SQLite` implementation of `LogRepository`
///
/// Borrows a plain connection or an open transaction.
pub struct SqliteLogRepository<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str =
    "SELECT day_index, date_iso, time, plan_text, done, amount, reaction, note, updated_at FROM logs";

impl<'a> SqliteLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
        let reaction: Option<String> = row.get(6)?;
        Ok(LogEntry {
            day_index: row.get(0)?,
            date: row.get(1)?,
            time: row.get(2)?,
            plan_text: row.get(3)?,
            done: row.get::<_, i32>(4)? != 0,
            amount: row.get(5)?,
            reaction: reaction.and_then(|value| value.parse().ok()),
            note: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl LogRepository for SqliteLogRepository<'_> {
    fn get(&self, key: &LogKey) -> Result<Option<LogEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE day_index = ? AND date_iso = ? AND time = ?"),
                params![key.day_index, key.date, key.time],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list(&self) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn list_for_day(&self, day_index: u32, date: NaiveDate) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE day_index = ? AND date_iso = ? ORDER BY time"
        ))?;
        let entries = stmt
            .query_map(params![day_index, date], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn insert(&self, entry: &LogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO logs (day_index, date_iso, time, plan_text, done, amount, reaction, note, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.day_index,
                entry.date,
                entry.time,
                entry.plan_text,
                i32::from(entry.done),
                entry.amount,
                entry.reaction.map(|reaction| reaction.as_str()),
                entry.note,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    fn overwrite(&self, entry: &LogEntry) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE logs
             SET plan_text = ?, done = ?, amount = ?, reaction = ?, note = ?, updated_at = ?
             WHERE day_index = ? AND date_iso = ? AND time = ?",
            params![
                entry.plan_text,
                i32::from(entry.done),
                entry.amount,
                entry.reaction.map(|reaction| reaction.as_str()),
                entry.note,
                entry.updated_at,
                entry.day_index,
                entry.date,
                entry.time,
            ],
        )?;
        Ok(rows > 0)
    }

    fn delete(&self, key: &LogKey) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM logs WHERE day_index = ? AND date_iso = ? AND time = ?",
            params![key.day_index, key.date, key.time],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Reaction;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn entry(day: u32, date: &str, time: &str, updated_at: i64) -> LogEntry {
        LogEntry::new(LogKey::new(day, date.parse().unwrap(), time), updated_at)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqliteLogRepository::new(db.connection());

        let mut log = entry(3, "2024-01-05", "07:00", 100);
        log.amount = Some("40 g".to_string());
        log.reaction = Some(Reaction::Rash);
        repo.insert(&log).unwrap();

        let fetched = repo.get(&log.key()).unwrap().unwrap();
        assert_eq!(fetched, log);
    }

    #[test]
    fn test_natural_key_is_unique() {
        let db = setup();
        let repo = SqliteLogRepository::new(db.connection());

        repo.insert(&entry(1, "2024-01-01", "07:00", 1)).unwrap();
        assert!(repo.insert(&entry(1, "2024-01-01", "07:00", 2)).is_err());
    }

    #[test]
    fn test_overwrite_replaces_fields() {
        let db = setup();
        let repo = SqliteLogRepository::new(db.connection());

        let original = entry(1, "2024-01-01", "07:00", 1);
        repo.insert(&original).unwrap();

        let mut replacement = original.clone();
        replacement.done = true;
        replacement.note = Some("loved it".to_string());
        replacement.updated_at = 9;
        assert!(repo.overwrite(&replacement).unwrap());
        assert_eq!(repo.get(&original.key()).unwrap().unwrap(), replacement);

        let missing = entry(2, "2024-01-01", "07:00", 1);
        assert!(!repo.overwrite(&missing).unwrap());
    }

    #[test]
    fn test_list_for_day_filters_by_date() {
        let db = setup();
        let repo = SqliteLogRepository::new(db.connection());

        repo.insert(&entry(1, "2024-01-01", "12:00", 1)).unwrap();
        repo.insert(&entry(1, "2024-01-01", "07:00", 1)).unwrap();
        repo.insert(&entry(1, "2024-01-02", "07:00", 1)).unwrap();

        let day = repo.list_for_day(1, "2024-01-01".parse().unwrap()).unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].time, "07:00");
        assert_eq!(repo.list().unwrap().len(), 3);
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let repo = SqliteLogRepository::new(db.connection());

        let log = entry(1, "2024-01-01", "07:00", 1);
        repo.insert(&log).unwrap();
        assert!(repo.delete(&log.key()).unwrap());
        assert!(!repo.delete(&log.key()).unwrap());
        assert!(repo.get(&log.key()).unwrap().is_none());
    }
}
