//! Entity store: the local SQLite tables behind an async, cloneable handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Transaction;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::db::{
    keys, Database, DayMetaRepository, LogRepository, PlanOverrideRepository, SettingsRepository,
    SqliteDayMetaRepository, SqliteLogRepository, SqlitePlanOverrideRepository,
    SqliteSettingsRepository,
};
use crate::models::{
    check_day_index, check_time_label, normalize_family_code, DayMetaOverride, EntityKind,
    LogDetails, LogEntry, LogKey, PlanOverride,
};
use crate::state::SyncStatus;
use crate::sync::{self, MergeReport, Snapshot};
use crate::util::{next_updated_at, normalize_text_option, unix_millis_now};
use crate::{Error, Result};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Created,
    Updated,
    Deleted,
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    /// User edit on this device
    Local,
    /// Merge of a pulled or imported snapshot
    Remote,
}

/// Change notification emitted after a write has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: EntityKind,
    pub op: MutationOp,
    pub origin: MutationOrigin,
}

impl MutationEvent {
    const fn local(kind: EntityKind, op: MutationOp) -> Self {
        Self {
            kind,
            op,
            origin: MutationOrigin::Local,
        }
    }
}

/// Family code plus the persisted observable sync fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub family_code: Option<String>,
    pub status: SyncStatus,
}

/// Thread-safe handle to the local entity tables.
#[derive(Clone)]
pub struct EntityStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    events: broadcast::Sender<MutationEvent>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Open (or create) the store at `db_path`, creating parent directories.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::debug!("Opening entity store at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            events,
        }
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Receive every committed mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Run `callback` for every committed mutation of `kind`.
    ///
    /// The callback task ends when the store is dropped or the handle aborted.
    pub fn on_mutation<F>(&self, kind: EntityKind, callback: F) -> JoinHandle<()>
    where
        F: Fn(MutationEvent) + Send + 'static,
    {
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.kind == kind => callback(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Mutation listener for {kind} missed {missed} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn emit(&self, event: MutationEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    async fn with_transaction<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send,
    {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let value = operation(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Hold the database lock, stalling every other store call.
    #[cfg(test)]
    pub(crate) async fn lock_database(&self) -> tokio::sync::MutexGuard<'_, Database> {
        self.db.lock().await
    }

    // ---------------------------------------------------------------------
    // Logs
    // ---------------------------------------------------------------------

    pub async fn get_log(&self, key: &LogKey) -> Result<Option<LogEntry>> {
        let db = self.db.lock().await;
        SqliteLogRepository::new(db.connection()).get(key)
    }

    pub async fn list_logs(&self) -> Result<Vec<LogEntry>> {
        let db = self.db.lock().await;
        SqliteLogRepository::new(db.connection()).list()
    }

    pub async fn list_logs_for_day(&self, day_index: u32, date: NaiveDate) -> Result<Vec<LogEntry>> {
        let db = self.db.lock().await;
        SqliteLogRepository::new(db.connection()).list_for_day(day_index, date)
    }

    /// Flip the done flag of a slot, creating the entry (done) on first use.
    pub async fn toggle_done(&self, key: &LogKey, plan_text: Option<String>) -> Result<LogEntry> {
        check_day_index(key.day_index)?;
        check_time_label(&key.time)?;

        let (entry, op) = self
            .with_transaction(|tx| {
                let repo = SqliteLogRepository::new(tx);
                match repo.get(key)? {
                    Some(mut entry) => {
                        entry.done = !entry.done;
                        if entry.plan_text.is_none() {
                            entry.plan_text = normalize_text_option(plan_text);
                        }
                        entry.updated_at = next_updated_at(Some(entry.updated_at));
                        repo.overwrite(&entry)?;
                        Ok((entry, MutationOp::Updated))
                    }
                    None => {
                        let mut entry = LogEntry::new(key.clone(), next_updated_at(None));
                        entry.done = true;
                        entry.plan_text = normalize_text_option(plan_text);
                        repo.insert(&entry)?;
                        Ok((entry, MutationOp::Created))
                    }
                }
            })
            .await?;

        tracing::debug!("Toggled {} -> done={}", entry.key(), entry.done);
        self.emit(MutationEvent::local(EntityKind::Logs, op));
        Ok(entry)
    }

    /// Update amount, reaction, note or done of a slot, creating it if needed.
    pub async fn set_log_details(&self, key: &LogKey, details: LogDetails) -> Result<LogEntry> {
        check_day_index(key.day_index)?;
        check_time_label(&key.time)?;
        if details.is_empty() {
            return Err(Error::InvalidInput("no log details to update".to_string()));
        }

        let (entry, op) = self
            .with_transaction(|tx| {
                let repo = SqliteLogRepository::new(tx);
                let existing = repo.get(key)?;
                let previous = existing.as_ref().map(|entry| entry.updated_at);
                let is_new = existing.is_none();

                let mut entry = existing.unwrap_or_else(|| LogEntry::new(key.clone(), 0));
                details.apply_to(&mut entry);
                entry.updated_at = next_updated_at(previous);

                if is_new {
                    repo.insert(&entry)?;
                    Ok((entry, MutationOp::Created))
                } else {
                    repo.overwrite(&entry)?;
                    Ok((entry, MutationOp::Updated))
                }
            })
            .await?;

        self.emit(MutationEvent::local(EntityKind::Logs, op));
        Ok(entry)
    }

    /// Insert or replace a whole entry, stamping a fresh timestamp.
    pub async fn upsert_log(&self, mut entry: LogEntry) -> Result<LogEntry> {
        entry.validate()?;
        entry.plan_text = normalize_text_option(entry.plan_text.take());
        entry.amount = normalize_text_option(entry.amount.take());
        entry.note = normalize_text_option(entry.note.take());

        let (entry, op) = self
            .with_transaction(move |tx| {
                let repo = SqliteLogRepository::new(tx);
                let previous = repo.get(&entry.key())?.map(|existing| existing.updated_at);
                entry.updated_at = next_updated_at(previous);
                if previous.is_some() {
                    repo.overwrite(&entry)?;
                    Ok((entry, MutationOp::Updated))
                } else {
                    repo.insert(&entry)?;
                    Ok((entry, MutationOp::Created))
                }
            })
            .await?;

        self.emit(MutationEvent::local(EntityKind::Logs, op));
        Ok(entry)
    }

    /// Hard delete. Deletions stay local; merges never resurrect or remove rows.
    pub async fn delete_log(&self, key: &LogKey) -> Result<bool> {
        let deleted = {
            let db = self.db.lock().await;
            SqliteLogRepository::new(db.connection()).delete(key)?
        };
        if deleted {
            self.emit(MutationEvent::local(EntityKind::Logs, MutationOp::Deleted));
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------------
    // Plan overrides
    // ---------------------------------------------------------------------

    pub async fn get_plan_override(
        &self,
        day_index: u32,
        time: &str,
    ) -> Result<Option<PlanOverride>> {
        let db = self.db.lock().await;
        SqlitePlanOverrideRepository::new(db.connection()).get(day_index, time)
    }

    pub async fn list_plan_overrides(&self) -> Result<Vec<PlanOverride>> {
        let db = self.db.lock().await;
        SqlitePlanOverrideRepository::new(db.connection()).list()
    }

    pub async fn upsert_plan_override(
        &self,
        day_index: u32,
        time: &str,
        plan_text: &str,
    ) -> Result<PlanOverride> {
        check_day_index(day_index)?;
        check_time_label(time)?;
        let plan_text = normalize_text_option(Some(plan_text.to_string()))
            .ok_or_else(|| Error::InvalidInput("plan text must not be empty".to_string()))?;
        let time = time.trim().to_string();

        let (item, op) = self
            .with_transaction(move |tx| {
                let repo = SqlitePlanOverrideRepository::new(tx);
                let previous = repo.get(day_index, &time)?.map(|item| item.updated_at);
                let item = PlanOverride {
                    day_index,
                    time,
                    plan_text,
                    updated_at: next_updated_at(previous),
                };
                if previous.is_some() {
                    repo.overwrite(&item)?;
                    Ok((item, MutationOp::Updated))
                } else {
                    repo.insert(&item)?;
                    Ok((item, MutationOp::Created))
                }
            })
            .await?;

        self.emit(MutationEvent::local(EntityKind::PlanOverrides, op));
        Ok(item)
    }

    /// Drop the override so the default plan text shows again.
    pub async fn reset_plan_override(&self, day_index: u32, time: &str) -> Result<bool> {
        let deleted = {
            let db = self.db.lock().await;
            SqlitePlanOverrideRepository::new(db.connection()).delete(day_index, time.trim())?
        };
        if deleted {
            self.emit(MutationEvent::local(
                EntityKind::PlanOverrides,
                MutationOp::Deleted,
            ));
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------------
    // Day meta
    // ---------------------------------------------------------------------

    pub async fn get_day_meta(&self, day_index: u32) -> Result<Option<DayMetaOverride>> {
        let db = self.db.lock().await;
        SqliteDayMetaRepository::new(db.connection()).get(day_index)
    }

    pub async fn list_day_meta(&self) -> Result<Vec<DayMetaOverride>> {
        let db = self.db.lock().await;
        SqliteDayMetaRepository::new(db.connection()).list()
    }

    pub async fn upsert_day_focus(&self, day_index: u32, focus: &str) -> Result<DayMetaOverride> {
        check_day_index(day_index)?;
        let focus = normalize_text_option(Some(focus.to_string()))
            .ok_or_else(|| Error::InvalidInput("focus must not be empty".to_string()))?;

        let (item, op) = self
            .with_transaction(move |tx| {
                let repo = SqliteDayMetaRepository::new(tx);
                let previous = repo.get(day_index)?.map(|item| item.updated_at);
                let item = DayMetaOverride {
                    day_index,
                    focus: Some(focus),
                    updated_at: next_updated_at(previous),
                };
                if previous.is_some() {
                    repo.overwrite(&item)?;
                    Ok((item, MutationOp::Updated))
                } else {
                    repo.insert(&item)?;
                    Ok((item, MutationOp::Created))
                }
            })
            .await?;

        self.emit(MutationEvent::local(EntityKind::DayMeta, op));
        Ok(item)
    }

    pub async fn reset_day_focus(&self, day_index: u32) -> Result<bool> {
        let deleted = {
            let db = self.db.lock().await;
            SqliteDayMetaRepository::new(db.connection()).delete(day_index)?
        };
        if deleted {
            self.emit(MutationEvent::local(EntityKind::DayMeta, MutationOp::Deleted));
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    pub async fn sync_settings(&self) -> Result<SyncSettings> {
        let db = self.db.lock().await;
        let repo = SqliteSettingsRepository::new(db.connection());
        Ok(SyncSettings {
            family_code: repo.family_code()?,
            status: repo.load_sync_status()?,
        })
    }

    pub async fn family_code(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).family_code()
    }

    /// Store a normalized family code and forget the previous family's baseline.
    pub async fn set_family_code(&self, raw: &str) -> Result<String> {
        let code = normalize_family_code(raw)?;
        let stored = code.clone();
        self.with_transaction(move |tx| {
            let repo = SqliteSettingsRepository::new(tx);
            if repo.family_code()?.as_deref() != Some(stored.as_str()) {
                repo.save_sync_status(&SyncStatus::default())?;
            }
            repo.set(keys::FAMILY_CODE, &stored)
        })
        .await?;
        tracing::info!("Family code set to {code}");
        Ok(code)
    }

    /// Leave the family. Local data is kept.
    pub async fn clear_family_code(&self) -> Result<()> {
        self.with_transaction(|tx| {
            let repo = SqliteSettingsRepository::new(tx);
            repo.remove(keys::FAMILY_CODE)?;
            repo.save_sync_status(&SyncStatus::default())
        })
        .await
    }

    pub async fn start_date(&self) -> Result<Option<NaiveDate>> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).get_date(keys::START_DATE)
    }

    pub async fn set_start_date(&self, date: Option<NaiveDate>) -> Result<()> {
        self.set_date(keys::START_DATE, date).await
    }

    pub async fn selected_date(&self) -> Result<Option<NaiveDate>> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).get_date(keys::SELECTED_DATE)
    }

    pub async fn set_selected_date(&self, date: Option<NaiveDate>) -> Result<()> {
        self.set_date(keys::SELECTED_DATE, date).await
    }

    async fn set_date(&self, key: &str, date: Option<NaiveDate>) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection())
            .set_optional(key, date.map(|date| date.to_string()).as_deref())
    }

    pub async fn sync_status(&self) -> Result<SyncStatus> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).load_sync_status()
    }

    pub async fn record_sync_status(&self, status: &SyncStatus) -> Result<()> {
        self.with_transaction(|tx| SqliteSettingsRepository::new(tx).save_sync_status(status))
            .await
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Read every table plus the plan dates, stamped with the current time.
    ///
    /// The reads share one transaction so another process writing the same
    /// file cannot interleave between tables.
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        let exported_at = unix_millis_now();
        self.with_transaction(move |tx| sync::read_snapshot(tx, exported_at))
            .await
    }

    /// Merge `snapshot` in one transaction. Nothing is written on failure.
    pub async fn apply_snapshot(&self, snapshot: &Snapshot) -> Result<MergeReport> {
        let report = self
            .with_transaction(|tx| sync::apply_snapshot(tx, snapshot))
            .await?;

        for (kind, kind_report) in [
            (EntityKind::Logs, report.logs),
            (EntityKind::PlanOverrides, report.plan_overrides),
            (EntityKind::DayMeta, report.day_meta),
        ] {
            if !kind_report.changed() {
                continue;
            }
            let op = if kind_report.overwritten > 0 {
                MutationOp::Updated
            } else {
                MutationOp::Created
            };
            self.emit(MutationEvent {
                kind,
                op,
                origin: MutationOrigin::Remote,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reaction;
    use pretty_assertions::assert_eq;

    fn date(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    fn key(day: u32, time: &str) -> LogKey {
        LogKey::new(day, date("2024-01-05"), time)
    }

    #[tokio::test]
    async fn upsert_log_replaces_whole_entry() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut events = store.subscribe();

        let mut entry = LogEntry::new(key(2, "12:00"), 0);
        entry.amount = Some(" 30 g ".to_string());
        entry.reaction = Some(Reaction::Tummy);
        let created = store.upsert_log(entry).await.unwrap();
        assert_eq!(created.amount.as_deref(), Some("30 g"));
        assert!(created.updated_at > 0);
        assert_eq!(events.recv().await.unwrap().op, MutationOp::Created);

        let replaced = store
            .upsert_log(LogEntry {
                done: true,
                ..LogEntry::new(key(2, "12:00"), 0)
            })
            .await
            .unwrap();
        assert!(replaced.updated_at > created.updated_at);
        assert_eq!(replaced.amount, None);
        assert_eq!(replaced.reaction, None);
        assert_eq!(events.recv().await.unwrap().op, MutationOp::Updated);
        assert_eq!(store.get_log(&key(2, "12:00")).await.unwrap(), Some(replaced));
    }

    #[tokio::test]
    async fn export_ignores_uncommitted_writes_from_another_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let store = EntityStore::open(&path).unwrap();
        store.upsert_day_focus(1, "Rice").await.unwrap();

        let mut other = rusqlite::Connection::open(&path).unwrap();
        let writer = other.transaction().unwrap();
        writer
            .execute(
                "INSERT INTO logs (day_index, date_iso, time, done, updated_at)
                 VALUES (1, '2024-01-05', '07:00', 1, 10)",
                [],
            )
            .unwrap();

        let snapshot = store.export_snapshot().await.unwrap();
        assert!(snapshot.logs.is_empty());
        assert_eq!(snapshot.day_meta.len(), 1);

        writer.commit().unwrap();
        assert_eq!(store.export_snapshot().await.unwrap().logs.len(), 1);
    }

    #[tokio::test]
    async fn toggle_creates_then_flips() {
        let store = EntityStore::open_in_memory().unwrap();
        let key = key(3, "07:00");

        let created = store
            .toggle_done(&key, Some("Porridge".to_string()))
            .await
            .unwrap();
        assert!(created.done);
        assert_eq!(created.plan_text.as_deref(), Some("Porridge"));

        let flipped = store.toggle_done(&key, None).await.unwrap();
        assert!(!flipped.done);
        assert!(flipped.updated_at > created.updated_at);
        assert_eq!(store.list_logs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_details_merges_fields() {
        let store = EntityStore::open_in_memory().unwrap();
        let key = key(1, "12:00");

        store
            .set_log_details(
                &key,
                LogDetails {
                    amount: Some("40 g".to_string()),
                    reaction: Some(Some(Reaction::Rash)),
                    ..LogDetails::default()
                },
            )
            .await
            .unwrap();
        let entry = store
            .set_log_details(
                &key,
                LogDetails {
                    note: Some("fine".to_string()),
                    ..LogDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(entry.amount.as_deref(), Some("40 g"));
        assert_eq!(entry.reaction, Some(Reaction::Rash));
        assert_eq!(entry.note.as_deref(), Some("fine"));
        assert!(!entry.done);

        let error = store
            .set_log_details(&key, LogDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn edits_stamp_strictly_increasing_timestamps() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut last = 0;
        for text in ["a", "b", "c", "d"] {
            let item = store.upsert_plan_override(5, "12:00", text).await.unwrap();
            assert!(item.updated_at > last);
            last = item.updated_at;
        }
        assert_eq!(
            store
                .get_plan_override(5, "12:00")
                .await
                .unwrap()
                .map(|item| item.plan_text),
            Some("d".to_string())
        );
    }

    #[tokio::test]
    async fn upsert_keeps_timestamp_ahead_of_future_stamp() {
        let store = EntityStore::open_in_memory().unwrap();
        let far_future = unix_millis_now() + 3_600_000;
        let remote = Snapshot {
            day_meta: vec![DayMetaOverride {
                day_index: 2,
                focus: Some("Remote".to_string()),
                updated_at: far_future,
            }],
            ..Snapshot::empty(0)
        };
        store.apply_snapshot(&remote).await.unwrap();

        let edited = store.upsert_day_focus(2, "Local").await.unwrap();
        assert_eq!(edited.updated_at, far_future + 1);
    }

    #[tokio::test]
    async fn validation_rejects_bad_input() {
        let store = EntityStore::open_in_memory().unwrap();
        assert!(store.toggle_done(&key(0, "07:00"), None).await.is_err());
        assert!(store.upsert_plan_override(1, " ", "x").await.is_err());
        assert!(store.upsert_day_focus(1, "   ").await.is_err());
        assert!(store.list_logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resets_remove_overrides() {
        let store = EntityStore::open_in_memory().unwrap();
        store.upsert_plan_override(1, "08:00", "Apple").await.unwrap();
        store.upsert_day_focus(1, "Fruit").await.unwrap();

        assert!(store.reset_plan_override(1, "08:00").await.unwrap());
        assert!(!store.reset_plan_override(1, "08:00").await.unwrap());
        assert!(store.reset_day_focus(1).await.unwrap());
        assert!(store.list_plan_overrides().await.unwrap().is_empty());
        assert!(store.list_day_meta().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_are_broadcast_with_origin() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut events = store.subscribe();

        store.upsert_day_focus(1, "Veg").await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            MutationEvent::local(EntityKind::DayMeta, MutationOp::Created)
        );

        let remote = Snapshot {
            logs: vec![LogEntry::new(key(2, "09:00"), 10)],
            ..Snapshot::empty(0)
        };
        store.apply_snapshot(&remote).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            MutationEvent {
                kind: EntityKind::Logs,
                op: MutationOp::Created,
                origin: MutationOrigin::Remote,
            }
        );

        // A no-op merge emits nothing
        store.apply_snapshot(&remote).await.unwrap();
        store.delete_log(&key(2, "09:00")).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            MutationEvent::local(EntityKind::Logs, MutationOp::Deleted)
        );
    }

    #[tokio::test]
    async fn on_mutation_filters_by_kind() {
        let store = EntityStore::open_in_memory().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = store.on_mutation(EntityKind::PlanOverrides, move |event| {
            let _ = tx.send(event);
        });
        tokio::task::yield_now().await;

        store.upsert_day_focus(1, "Veg").await.unwrap();
        store.upsert_plan_override(1, "08:00", "Pear").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EntityKind::PlanOverrides);
        assert_eq!(event.op, MutationOp::Created);
        handle.abort();
    }

    #[tokio::test]
    async fn failed_merge_leaves_every_table_untouched() {
        let store = EntityStore::open_in_memory().unwrap();
        store.toggle_done(&key(3, "07:00"), None).await.unwrap();
        let before = store.export_snapshot().await.unwrap();

        {
            let db = store.db.lock().await;
            db.connection()
                .execute_batch(
                    "CREATE TRIGGER fail_day_meta BEFORE INSERT ON day_meta
                     BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
                )
                .unwrap();
        }

        let mut remote_log = LogEntry::new(key(3, "07:00"), i64::MAX - 1);
        remote_log.note = Some("remote".to_string());
        let remote = Snapshot {
            start_date: Some(date("2024-02-01")),
            logs: vec![remote_log, LogEntry::new(key(4, "10:00"), 5)],
            plan_overrides: vec![PlanOverride {
                day_index: 1,
                time: "08:00".to_string(),
                plan_text: "Remote".to_string(),
                updated_at: 5,
            }],
            day_meta: vec![DayMetaOverride {
                day_index: 1,
                focus: Some("Remote".to_string()),
                updated_at: 5,
            }],
            ..Snapshot::empty(0)
        };

        assert!(store.apply_snapshot(&remote).await.is_err());

        let after = store.export_snapshot().await.unwrap();
        assert_eq!(after.logs, before.logs);
        assert!(after.plan_overrides.is_empty());
        assert!(after.day_meta.is_empty());
        assert_eq!(store.start_date().await.unwrap(), None);
    }

    #[tokio::test]
    async fn family_code_change_resets_sync_status() {
        let store = EntityStore::open_in_memory().unwrap();
        assert_eq!(store.set_family_code(" ab12cd ").await.unwrap(), "AB12CD");

        let status = SyncStatus {
            remote_updated_at: Some(99),
            ..SyncStatus::default()
        };
        store.record_sync_status(&status).await.unwrap();

        // Same family keeps its baseline
        store.set_family_code("AB12CD").await.unwrap();
        assert_eq!(store.sync_status().await.unwrap().remote_updated_at, Some(99));

        store.set_family_code("ZZ9999").await.unwrap();
        let settings = store.sync_settings().await.unwrap();
        assert_eq!(settings.family_code.as_deref(), Some("ZZ9999"));
        assert_eq!(settings.status, SyncStatus::default());

        store.clear_family_code().await.unwrap();
        assert_eq!(store.family_code().await.unwrap(), None);
    }

    #[tokio::test]
    async fn plan_dates_round_trip_through_snapshot() {
        let store = EntityStore::open_in_memory().unwrap();
        store.set_start_date(Some(date("2024-01-01"))).await.unwrap();
        store.set_selected_date(Some(date("2024-01-05"))).await.unwrap();

        let snapshot = store.export_snapshot().await.unwrap();
        assert_eq!(snapshot.start_date, Some(date("2024-01-01")));
        assert_eq!(snapshot.selected_date, Some(date("2024-01-05")));

        store.set_selected_date(None).await.unwrap();
        assert_eq!(store.selected_date().await.unwrap(), None);
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prikorm.db");

        let store = EntityStore::open(&path).unwrap();
        store.upsert_day_focus(1, "Veg").await.unwrap();
        drop(store);

        let reopened = EntityStore::open(&path).unwrap();
        assert_eq!(reopened.list_day_meta().await.unwrap().len(), 1);
        assert_eq!(reopened.db_path(), Some(path.as_path()));
    }
}
