//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: feeding logs and local settings
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day_index INTEGER NOT NULL,
            date_iso TEXT NOT NULL,
            time TEXT NOT NULL,
            plan_text TEXT,
            done INTEGER NOT NULL DEFAULT 0,
            amount TEXT,
            reaction TEXT,
            note TEXT,
            updated_at INTEGER NOT NULL,
            UNIQUE (day_index, date_iso, time)
        );
        CREATE INDEX IF NOT EXISTS idx_logs_date ON logs(date_iso);
        CREATE INDEX IF NOT EXISTS idx_logs_updated ON logs(updated_at);
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: plan and day focus overrides
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS plan_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day_index INTEGER NOT NULL,
            time TEXT NOT NULL,
            plan_text TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (day_index, time)
        );
        CREATE TABLE IF NOT EXISTS day_meta (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day_index INTEGER NOT NULL UNIQUE,
            focus TEXT,
            updated_at INTEGER NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_v1_database_upgrades_to_v2() {
        let mut conn = setup();
        migrate_v1(&mut conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), 1);

        run(&mut conn).unwrap();

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'plan_overrides'
                )",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(exists);
    }
}
