//! Sync scheduler: decides when to push and pull, and keeps the two apart.
//!
//! Local edits arm a debounce timer that ends in a push. Pulls run at
//! startup, on a fixed interval while online, and whenever the host reports
//! that the app became visible or regained connectivity. While a pulled
//! snapshot is being merged (and for a short settle window afterwards) no
//! push may start, so a half-merged store is never exported.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SyncTimings;
use crate::services::{EntityStore, MutationEvent, MutationOrigin};
use crate::state::{SyncState, SyncStatus};
use crate::util::unix_millis_now;
use crate::{Error, Result};

use super::merge::MergeReport;
use super::remote::RemoteStore;
use super::snapshot::import_snapshot;

/// Why a push or pull did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No family code configured; sync is disabled
    NoFamilyCode,
    /// The host reported no connectivity
    Offline,
    /// A pulled snapshot is being merged or is settling
    ApplyingRemote,
    PushInFlight,
    PullInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { remote_updated_at: i64 },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The remote snapshot was newer and has been merged
    Applied {
        remote_updated_at: i64,
        report: MergeReport,
    },
    /// The remote slot is not newer than the last applied or pushed write
    UpToDate { remote_updated_at: i64 },
    /// The family has no remote snapshot yet, or it is unreadable
    NothingRemote,
    Skipped(SkipReason),
    Failed(String),
}

/// Orchestrates push and pull for one store and one remote.
///
/// Dropping the scheduler stops its background tasks. An operation already
/// talking to the remote runs to completion.
pub struct SyncScheduler<R: RemoteStore> {
    inner: Arc<Inner<R>>,
}

struct Inner<R: RemoteStore> {
    store: EntityStore,
    remote: R,
    timings: SyncTimings,
    pushing: AtomicBool,
    pulling: AtomicBool,
    applying_remote: AtomicBool,
    apply_generation: AtomicU64,
    online: AtomicBool,
    /// A debounced push was dropped while offline
    push_pending: AtomicBool,
    debounce: Mutex<Option<JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    status: watch::Sender<SyncStatus>,
    status_lock: tokio::sync::Mutex<()>,
}

/// Holds an in-flight flag for the lifetime of an operation.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R: RemoteStore> SyncScheduler<R> {
    /// Create a stopped scheduler, restoring the persisted sync status.
    pub async fn new(store: EntityStore, remote: R, timings: SyncTimings) -> Result<Self> {
        let status = store.sync_status().await?;
        let (status, _) = watch::channel(status);
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                remote,
                timings,
                pushing: AtomicBool::new(false),
                pulling: AtomicBool::new(false),
                applying_remote: AtomicBool::new(false),
                apply_generation: AtomicU64::new(0),
                online: AtomicBool::new(true),
                push_pending: AtomicBool::new(false),
                debounce: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                status,
                status_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Observe every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn timings(&self) -> SyncTimings {
        self.inner.timings
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    pub fn is_applying_remote(&self) -> bool {
        self.inner.applying_remote.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.inner.tasks).is_empty()
    }

    /// Spawn the mutation listener and the pull loop. Idempotent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut tasks = lock(&self.inner.tasks);
        if !tasks.is_empty() {
            return;
        }

        // Subscribe before spawning so no edit made right after start is missed
        let events = self.inner.store.subscribe();
        tasks.push(tokio::spawn(Inner::listen_for_mutations(
            Arc::clone(&self.inner),
            events,
        )));
        tasks.push(tokio::spawn(Inner::poll_loop(Arc::clone(&self.inner))));
        tracing::info!(
            "Sync scheduler started (debounce={:?}, poll={:?})",
            self.inner.timings.push_debounce,
            self.inner.timings.poll_interval
        );
    }

    /// Cancel timers and background tasks and release the applying guard.
    pub fn stop(&self) {
        let tasks: Vec<_> = lock(&self.inner.tasks).drain(..).collect();
        let was_running = !tasks.is_empty();
        for task in tasks {
            task.abort();
        }
        if let Some(pending) = lock(&self.inner.debounce).take() {
            pending.abort();
        }
        self.inner.apply_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.applying_remote.store(false, Ordering::SeqCst);
        if was_running {
            tracing::info!("Sync scheduler stopped");
        }
    }

    /// Report connectivity. Coming back online triggers a pull, and re-arms
    /// a push dropped while offline.
    pub fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::debug!("Connectivity regained, pulling");
            self.spawn_pull("online");
            if self.inner.push_pending.swap(false, Ordering::SeqCst) {
                Inner::arm_debounce(&self.inner);
            }
        }
    }

    /// Report that the app became visible again. Pulls when online.
    pub fn notify_visible(&self) {
        if self.is_online() {
            self.spawn_pull("visible");
        }
    }

    /// Arm (or restart) the debounce timer that ends in a push.
    pub fn schedule_push(&self) {
        Inner::arm_debounce(&self.inner);
    }

    /// Push immediately, bypassing the debounce. Skipped while offline.
    pub async fn push_now(&self) -> PushOutcome {
        self.inner.push().await
    }

    /// Pull immediately, regardless of the poll timer.
    pub async fn pull_now(&self) -> PullOutcome {
        Inner::pull(&self.inner, "manual").await
    }

    fn spawn_pull(&self, reason: &'static str) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Inner::pull(&inner, reason).await;
        });
    }
}

impl<R: RemoteStore> Drop for SyncScheduler<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: RemoteStore> Inner<R> {
    async fn listen_for_mutations(
        inner: Arc<Self>,
        mut events: broadcast::Receiver<MutationEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) if event.origin == MutationOrigin::Local => {
                    tracing::trace!("Local {:?} on {}, arming push", event.op, event.kind);
                    Self::arm_debounce(&inner);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Mutation listener lagged by {missed} events");
                    Self::arm_debounce(&inner);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn poll_loop(inner: Arc<Self>) {
        if inner.online.load(Ordering::SeqCst) {
            Self::pull(&inner, "startup").await;
        }

        let period = inner.timings.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if inner.online.load(Ordering::SeqCst) {
                Self::pull(&inner, "poll").await;
            } else {
                tracing::trace!("Offline, skipping poll");
            }
        }
    }

    fn arm_debounce(inner: &Arc<Self>) {
        let delay = inner.timings.push_debounce;
        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach the push so re-arming only cancels the wait
            tokio::spawn(Self::debounced_push(task_inner));
        });

        if let Some(previous) = lock(&inner.debounce).replace(handle) {
            previous.abort();
        }
    }

    async fn debounced_push(inner: Arc<Self>) {
        match inner.push().await {
            PushOutcome::Skipped(SkipReason::ApplyingRemote) => {
                tracing::debug!("Remote apply in progress, re-arming push");
                Self::arm_debounce(&inner);
            }
            PushOutcome::Skipped(SkipReason::Offline) => {
                tracing::debug!("Offline, holding push until connectivity returns");
                inner.push_pending.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    async fn push(&self) -> PushOutcome {
        if !self.online.load(Ordering::SeqCst) {
            return PushOutcome::Skipped(SkipReason::Offline);
        }
        if self.applying_remote.load(Ordering::SeqCst) {
            tracing::debug!("Skipping push while a remote snapshot is applied");
            return PushOutcome::Skipped(SkipReason::ApplyingRemote);
        }
        let Some(_in_flight) = FlagGuard::acquire(&self.pushing) else {
            tracing::debug!("Push already in flight");
            return PushOutcome::Skipped(SkipReason::PushInFlight);
        };
        let family_code = match self.store.family_code().await {
            Ok(Some(code)) => code,
            Ok(None) => {
                tracing::debug!("No family code, skipping push");
                return PushOutcome::Skipped(SkipReason::NoFamilyCode);
            }
            Err(error) => return self.push_failed(error).await,
        };

        let snapshot = match self.store.export_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => return self.push_failed(error).await,
        };
        // A pull may have started applying since the first check
        if self.applying_remote.load(Ordering::SeqCst) {
            tracing::debug!("Remote apply began during export, dropping push");
            return PushOutcome::Skipped(SkipReason::ApplyingRemote);
        }

        match self
            .remote
            .put_snapshot(&family_code, &snapshot, unix_millis_now())
            .await
        {
            Ok(remote_updated_at) => {
                tracing::info!(
                    "Pushed snapshot for family {family_code} ({} logs, {} plan overrides, {} day meta)",
                    snapshot.logs.len(),
                    snapshot.plan_overrides.len(),
                    snapshot.day_meta.len()
                );
                let now = unix_millis_now();
                self.update_status(move |status| {
                    status.state = SyncState::Ok;
                    status.remote_updated_at = Some(remote_updated_at);
                    status.last_push_at = Some(now);
                    status.last_error = None;
                })
                .await;
                PushOutcome::Pushed { remote_updated_at }
            }
            Err(error) => self.push_failed(error.into()).await,
        }
    }

    async fn push_failed(&self, error: Error) -> PushOutcome {
        let message = error.to_string();
        tracing::error!("Push failed: {message}");
        self.record_failure(message.clone()).await;
        PushOutcome::Failed(message)
    }

    async fn pull(inner: &Arc<Self>, reason: &'static str) -> PullOutcome {
        let family_code = match inner.store.family_code().await {
            Ok(Some(code)) => code,
            Ok(None) => {
                tracing::debug!("No family code, skipping {reason} pull");
                return PullOutcome::Skipped(SkipReason::NoFamilyCode);
            }
            Err(error) => return inner.pull_failed(error).await,
        };
        let Some(_in_flight) = FlagGuard::acquire(&inner.pulling) else {
            tracing::debug!("Pull already in flight, dropping {reason} pull");
            return PullOutcome::Skipped(SkipReason::PullInFlight);
        };

        let record = match inner.remote.fetch_snapshot(&family_code).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("Family {family_code} has no remote snapshot yet");
                inner.record_pull_checked().await;
                return PullOutcome::NothingRemote;
            }
            Err(error) => return inner.pull_failed(error.into()).await,
        };

        let baseline = inner.current_status().await;
        if !baseline.is_newer_than_baseline(record.updated_at) {
            tracing::debug!(
                "Remote snapshot at {} is not newer than {:?}",
                record.updated_at,
                baseline.remote_updated_at
            );
            inner.record_pull_checked().await;
            return PullOutcome::UpToDate {
                remote_updated_at: record.updated_at,
            };
        }

        let snapshot = match import_snapshot(&record.payload) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!("Ignoring unreadable remote snapshot: {error}");
                inner.record_pull_checked().await;
                return PullOutcome::NothingRemote;
            }
        };

        let generation = inner.begin_apply();
        match inner.store.apply_snapshot(&snapshot).await {
            Ok(report) => {
                if report.is_noop() {
                    tracing::debug!("Remote snapshot {} changed nothing", record.updated_at);
                } else {
                    tracing::info!("Applied remote snapshot {}: {report}", record.updated_at);
                }
                let remote_updated_at = record.updated_at;
                let now = unix_millis_now();
                inner
                    .update_status(move |status| {
                        status.state = SyncState::Ok;
                        // A push that landed meanwhile may already hold a newer baseline
                        status.remote_updated_at =
                            status.remote_updated_at.max(Some(remote_updated_at));
                        status.last_pull_at = Some(now);
                        status.last_error = None;
                    })
                    .await;
                Self::settle_apply(inner, generation);
                PullOutcome::Applied {
                    remote_updated_at,
                    report,
                }
            }
            Err(error) => {
                inner.end_apply(generation);
                inner.pull_failed(error).await
            }
        }
    }

    async fn pull_failed(&self, error: Error) -> PullOutcome {
        let message = error.to_string();
        tracing::error!("Pull failed: {message}");
        self.record_failure(message.clone()).await;
        PullOutcome::Failed(message)
    }

    fn begin_apply(&self) -> u64 {
        self.applying_remote.store(true, Ordering::SeqCst);
        self.apply_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Clear the applying guard unless a newer apply has taken it over.
    fn end_apply(&self, generation: u64) {
        if self.apply_generation.load(Ordering::SeqCst) == generation {
            self.applying_remote.store(false, Ordering::SeqCst);
        }
    }

    fn settle_apply(inner: &Arc<Self>, generation: u64) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.timings.settle_delay).await;
            inner.end_apply(generation);
        });
    }

    async fn current_status(&self) -> SyncStatus {
        match self.store.sync_status().await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!("Failed to read sync status: {error}");
                self.status.borrow().clone()
            }
        }
    }

    async fn record_pull_checked(&self) {
        let now = unix_millis_now();
        self.update_status(move |status| {
            status.state = SyncState::Ok;
            status.last_pull_at = Some(now);
            status.last_error = None;
        })
        .await;
    }

    async fn record_failure(&self, message: String) {
        self.update_status(move |status| {
            status.state = SyncState::Error;
            status.last_error = Some(message);
        })
        .await;
    }

    /// Apply `change` to the persisted status, then publish it.
    async fn update_status<F>(&self, change: F)
    where
        F: FnOnce(&mut SyncStatus) + Send,
    {
        let _serialized = self.status_lock.lock().await;
        let mut status = self.current_status().await;
        change(&mut status);
        if let Err(error) = self.store.record_sync_status(&status).await {
            tracing::warn!("Failed to persist sync status: {error}");
        }
        self.status.send_replace(status);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
