//! Plan override and day focus repositories

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{DayMetaOverride, PlanOverride};

/// Trait for plan override storage operations
pub trait PlanOverrideRepository {
    fn get(&self, day_index: u32, time: &str) -> Result<Option<PlanOverride>>;

    /// List every override in insertion order
    fn list(&self) -> Result<Vec<PlanOverride>>;

    fn insert(&self, item: &PlanOverride) -> Result<()>;

    /// Replace the override sharing `item`'s natural key
    fn overwrite(&self, item: &PlanOverride) -> Result<bool>;

    fn delete(&self, day_index: u32, time: &str) -> Result<bool>;
}

/// Trait for day focus storage operations
pub trait DayMetaRepository {
    fn get(&self, day_index: u32) -> Result<Option<DayMetaOverride>>;

    /// List every day focus override in insertion order
    fn list(&self) -> Result<Vec<DayMetaOverride>>;

    fn insert(&self, item: &DayMetaOverride) -> Result<()>;

    /// Replace the override for `item.day_index`
    fn overwrite(&self, item: &DayMetaOverride) -> Result<bool>;

    fn delete(&self, day_index: u32) -> Result<bool>;
}

/// `SQLite` implementation of `PlanOverrideRepository`
pub struct SqlitePlanOverrideRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePlanOverrideRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_override(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlanOverride> {
        Ok(PlanOverride {
            day_index: row.get(0)?,
            time: row.get(1)?,
            plan_text: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl PlanOverrideRepository for SqlitePlanOverrideRepository<'_> {
    fn get(&self, day_index: u32, time: &str) -> Result<Option<PlanOverride>> {
        let item = self
            .conn
            .query_row(
                "SELECT day_index, time, plan_text, updated_at FROM plan_overrides
                 WHERE day_index = ? AND time = ?",
                params![day_index, time],
                Self::parse_override,
            )
            .optional()?;
        Ok(item)
    }

    fn list(&self) -> Result<Vec<PlanOverride>> {
        let mut stmt = self.conn.prepare(
            "SELECT day_index, time, plan_text, updated_at FROM plan_overrides ORDER BY id",
        )?;
        let items = stmt
            .query_map([], Self::parse_override)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn insert(&self, item: &PlanOverride) -> Result<()> {
        self.conn.execute(
            "INSERT INTO plan_overrides (day_index, time, plan_text, updated_at) VALUES (?, ?, ?, ?)",
            params![item.day_index, item.time, item.plan_text, item.updated_at],
        )?;
        Ok(())
    }

    fn overwrite(&self, item: &PlanOverride) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE plan_overrides SET plan_text = ?, updated_at = ? WHERE day_index = ? AND time = ?",
            params![item.plan_text, item.updated_at, item.day_index, item.time],
        )?;
        Ok(rows > 0)
    }

    fn delete(&self, day_index: u32, time: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM plan_overrides WHERE day_index = ? AND time = ?",
            params![day_index, time],
        )?;
        Ok(rows > 0)
    }
}

/// `SQLite` implementation of `DayMetaRepository`
pub struct SqliteDayMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDayMetaRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_meta(row: &rusqlite::Row<'_>) -> rusqlite::Result<DayMetaOverride> {
        Ok(DayMetaOverride {
            day_index: row.get(0)?,
            focus: row.get(1)?,
            updated_at: row.get(2)?,
        })
    }
}

impl DayMetaRepository for SqliteDayMetaRepository<'_> {
    fn get(&self, day_index: u32) -> Result<Option<DayMetaOverride>> {
        let item = self
            .conn
            .query_row(
                "SELECT day_index, focus, updated_at FROM day_meta WHERE day_index = ?",
                params![day_index],
                Self::parse_meta,
            )
            .optional()?;
        Ok(item)
    }

    fn list(&self) -> Result<Vec<DayMetaOverride>> {
        let mut stmt = self
            .conn
            .prepare("SELECT day_index, focus, updated_at FROM day_meta ORDER BY id")?;
        let items = stmt
            .query_map([], Self::parse_meta)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn insert(&self, item: &DayMetaOverride) -> Result<()> {
        self.conn.execute(
            "INSERT INTO day_meta (day_index, focus, updated_at) VALUES (?, ?, ?)",
            params![item.day_index, item.focus, item.updated_at],
        )?;
        Ok(())
    }

    fn overwrite(&self, item: &DayMetaOverride) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE day_meta SET focus = ?, updated_at = ? WHERE day_index = ?",
            params![item.focus, item.updated_at, item.day_index],
        )?;
        Ok(rows > 0)
    }

    fn delete(&self, day_index: u32) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM day_meta WHERE day_index = ?", params![day_index])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_plan_override_crud() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqlitePlanOverrideRepository::new(db.connection());

        let item = PlanOverride {
            day_index: 5,
            time: "12:00".to_string(),
            plan_text: "Zucchini puree".to_string(),
            updated_at: 300,
        };
        repo.insert(&item).unwrap();
        assert_eq!(repo.get(5, "12:00").unwrap(), Some(item.clone()));

        let edited = PlanOverride {
            plan_text: "Broccoli".to_string(),
            updated_at: 301,
            ..item
        };
        assert!(repo.overwrite(&edited).unwrap());
        assert_eq!(repo.list().unwrap(), vec![edited]);

        assert!(repo.delete(5, "12:00").unwrap());
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_day_meta_crud() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteDayMetaRepository::new(db.connection());

        let item = DayMetaOverride {
            day_index: 2,
            focus: Some("Introduce oats".to_string()),
            updated_at: 10,
        };
        repo.insert(&item).unwrap();
        assert!(repo.insert(&item).is_err());
        assert_eq!(repo.get(2).unwrap(), Some(item));

        assert!(repo.delete(2).unwrap());
        assert_eq!(repo.get(2).unwrap(), None);
    }
}
