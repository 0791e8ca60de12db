//! Merge engine: last-write-wins reconciliation of a remote snapshot.
//!
//! Each entity kind is merged independently by natural key. A remote record
//! is inserted when its key is unknown locally and overwrites the local
//! record only when its `updated_at` is strictly greater; ties keep the
//! local record. Local records missing from the snapshot are never deleted.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{
    keys, DayMetaRepository, LogRepository, PlanOverrideRepository, SettingsRepository,
    SqliteDayMetaRepository, SqliteLogRepository, SqlitePlanOverrideRepository,
    SqliteSettingsRepository,
};
use crate::error::Result;
use crate::models::{DayMetaOverride, EntityKind, LogEntry, LogKey, PlanOverride};

use super::Snapshot;

/// An entity that can be reconciled by natural key and timestamp.
pub trait Mergeable: Clone {
    type Key: Eq + Hash + Clone;

    fn natural_key(&self) -> Self::Key;

    fn updated_at(&self) -> i64;
}

impl Mergeable for LogEntry {
    type Key = LogKey;

    fn natural_key(&self) -> LogKey {
        self.key()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

impl Mergeable for PlanOverride {
    type Key = (u32, String);

    fn natural_key(&self) -> Self::Key {
        self.key()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

impl Mergeable for DayMetaOverride {
    type Key = u32;

    fn natural_key(&self) -> u32 {
        self.day_index
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// A write the merge will perform for one remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction<T> {
    /// No local record shares the key
    Insert(T),
    /// Remote record is strictly newer than the local one
    Overwrite(T),
}

/// Decide, without touching storage, which remote records win.
///
/// If the same key appears several times in `remote`, the newest copy wins
/// (first one on ties), so a key yields at most one action.
pub fn plan_merge<T: Mergeable>(local: &[T], remote: &[T]) -> Vec<MergeAction<T>> {
    let mut current: HashMap<T::Key, i64> = local
        .iter()
        .map(|record| (record.natural_key(), record.updated_at()))
        .collect();
    let local_keys: HashSet<T::Key> = local.iter().map(Mergeable::natural_key).collect();
    let mut planned: HashMap<T::Key, usize> = HashMap::new();
    let mut actions = Vec::new();

    for record in remote {
        let key = record.natural_key();
        let wins = current
            .get(&key)
            .map_or(true, |&local_ts| record.updated_at() > local_ts);
        if !wins {
            continue;
        }

        current.insert(key.clone(), record.updated_at());
        if let Some(&index) = planned.get(&key) {
            // A newer duplicate replaces the earlier plan but keeps its kind
            actions[index] = match &actions[index] {
                MergeAction::Insert(_) => MergeAction::Insert(record.clone()),
                MergeAction::Overwrite(_) => MergeAction::Overwrite(record.clone()),
            };
        } else {
            let action = if local_keys.contains(&key) {
                MergeAction::Overwrite(record.clone())
            } else {
                MergeAction::Insert(record.clone())
            };
            planned.insert(key, actions.len());
            actions.push(action);
        }
    }

    actions
}

/// Outcome of merging one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindReport {
    pub inserted: usize,
    pub overwritten: usize,
    pub unchanged: usize,
}

impl KindReport {
    pub const fn changed(&self) -> bool {
        self.inserted > 0 || self.overwritten > 0
    }
}

/// Outcome of merging a whole snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub logs: KindReport,
    pub plan_overrides: KindReport,
    pub day_meta: KindReport,
}

impl MergeReport {
    pub const fn is_noop(&self) -> bool {
        !self.logs.changed() && !self.plan_overrides.changed() && !self.day_meta.changed()
    }

    /// Entity kinds that received at least one write.
    pub fn changed_kinds(&self) -> Vec<EntityKind> {
        [
            (EntityKind::Logs, self.logs),
            (EntityKind::PlanOverrides, self.plan_overrides),
            (EntityKind::DayMeta, self.day_meta),
        ]
        .into_iter()
        .filter(|(_, report)| report.changed())
        .map(|(kind, _)| kind)
        .collect()
    }
}

impl std::fmt::Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "logs +{}/~{}, planOverrides +{}/~{}, dayMeta +{}/~{}",
            self.logs.inserted,
            self.logs.overwritten,
            self.plan_overrides.inserted,
            self.plan_overrides.overwritten,
            self.day_meta.inserted,
            self.day_meta.overwritten,
        )
    }
}

/// Storage side of a merge for one entity kind.
trait MergeTable<T> {
    fn load_all(&self) -> Result<Vec<T>>;
    fn insert_record(&self, record: &T) -> Result<()>;
    fn overwrite_record(&self, record: &T) -> Result<bool>;
}

impl MergeTable<LogEntry> for SqliteLogRepository<'_> {
    fn load_all(&self) -> Result<Vec<LogEntry>> {
        LogRepository::list(self)
    }

    fn insert_record(&self, record: &LogEntry) -> Result<()> {
        LogRepository::insert(self, record)
    }

    fn overwrite_record(&self, record: &LogEntry) -> Result<bool> {
        LogRepository::overwrite(self, record)
    }
}

impl MergeTable<PlanOverride> for SqlitePlanOverrideRepository<'_> {
    fn load_all(&self) -> Result<Vec<PlanOverride>> {
        PlanOverrideRepository::list(self)
    }

    fn insert_record(&self, record: &PlanOverride) -> Result<()> {
        PlanOverrideRepository::insert(self, record)
    }

    fn overwrite_record(&self, record: &PlanOverride) -> Result<bool> {
        PlanOverrideRepository::overwrite(self, record)
    }
}

impl MergeTable<DayMetaOverride> for SqliteDayMetaRepository<'_> {
    fn load_all(&self) -> Result<Vec<DayMetaOverride>> {
        DayMetaRepository::list(self)
    }

    fn insert_record(&self, record: &DayMetaOverride) -> Result<()> {
        DayMetaRepository::insert(self, record)
    }

    fn overwrite_record(&self, record: &DayMetaOverride) -> Result<bool> {
        DayMetaRepository::overwrite(self, record)
    }
}

fn merge_table<T, R>(table: &R, remote: &[T]) -> Result<KindReport>
where
    T: Mergeable,
    R: MergeTable<T>,
{
    let local = table.load_all()?;
    let actions = plan_merge(&local, remote);

    let mut report = KindReport::default();
    for action in &actions {
        match action {
            MergeAction::Insert(record) => {
                table.insert_record(record)?;
                report.inserted += 1;
            }
            MergeAction::Overwrite(record) => {
                if table.overwrite_record(record)? {
                    report.overwritten += 1;
                }
            }
        }
    }
    report.unchanged = remote.len() - report.inserted - report.overwritten;
    Ok(report)
}

/// Merge `snapshot` into the tables reachable through `conn`.
///
/// Callers run this inside one transaction so a failure leaves every table
/// untouched. Plan dates carried by the snapshot replace the local ones.
pub fn apply_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<MergeReport> {
    let report = MergeReport {
        logs: merge_table(&SqliteLogRepository::new(conn), &snapshot.logs)?,
        plan_overrides: merge_table(
            &SqlitePlanOverrideRepository::new(conn),
            &snapshot.plan_overrides,
        )?,
        day_meta: merge_table(&SqliteDayMetaRepository::new(conn), &snapshot.day_meta)?,
    };

    let settings = SqliteSettingsRepository::new(conn);
    apply_date(&settings, keys::START_DATE, snapshot.start_date)?;
    apply_date(&settings, keys::SELECTED_DATE, snapshot.selected_date)?;

    Ok(report)
}

fn apply_date(
    settings: &SqliteSettingsRepository<'_>,
    key: &str,
    value: Option<NaiveDate>,
) -> Result<()> {
    match value {
        Some(date) => settings.set(key, &date.to_string()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(day_index: u32, focus: &str, updated_at: i64) -> DayMetaOverride {
        DayMetaOverride {
            day_index,
            focus: Some(focus.to_string()),
            updated_at,
        }
    }

    #[test]
    fn unknown_keys_are_inserted() {
        let actions = plan_merge(&[meta(1, "a", 5)], &[meta(2, "b", 1)]);
        assert_eq!(actions, vec![MergeAction::Insert(meta(2, "b", 1))]);
    }

    #[test]
    fn strictly_newer_remote_overwrites() {
        let actions = plan_merge(&[meta(1, "local", 5)], &[meta(1, "remote", 6)]);
        assert_eq!(actions, vec![MergeAction::Overwrite(meta(1, "remote", 6))]);
    }

    #[test]
    fn ties_and_older_remote_keep_local() {
        assert!(plan_merge(&[meta(1, "local", 5)], &[meta(1, "remote", 5)]).is_empty());
        assert!(plan_merge(&[meta(1, "local", 5)], &[meta(1, "remote", 4)]).is_empty());
    }

    #[test]
    fn last_write_wins_for_every_timestamp_pair() {
        for local_ts in [-1, 0, 1, 100, i64::MAX - 1] {
            for remote_ts in [-1, 0, 1, 100, i64::MAX] {
                let actions = plan_merge(&[meta(1, "l", local_ts)], &[meta(1, "r", remote_ts)]);
                assert_eq!(actions.is_empty(), remote_ts <= local_ts);
            }
        }
    }

    #[test]
    fn duplicate_remote_keys_collapse_to_newest() {
        let actions = plan_merge(
            &[],
            &[meta(3, "old", 1), meta(3, "new", 9), meta(3, "stale", 4)],
        );
        assert_eq!(actions, vec![MergeAction::Insert(meta(3, "new", 9))]);

        let actions = plan_merge(
            &[meta(3, "local", 2)],
            &[meta(3, "newer", 5), meta(3, "newest", 7)],
        );
        assert_eq!(actions, vec![MergeAction::Overwrite(meta(3, "newest", 7))]);
    }

    #[test]
    fn report_lists_changed_kinds() {
        let report = MergeReport {
            plan_overrides: KindReport {
                inserted: 1,
                ..KindReport::default()
            },
            ..MergeReport::default()
        };
        assert!(!report.is_noop());
        assert_eq!(report.changed_kinds(), vec![EntityKind::PlanOverrides]);
        assert!(MergeReport::default().is_noop());
    }
}
