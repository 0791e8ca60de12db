//! Remote slot abstraction and an in-process implementation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use super::Snapshot;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Row stored in a family's remote slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Raw snapshot JSON, decoded later with [`super::import_snapshot`]
    pub payload: Value,
    /// Slot modification time (Unix ms)
    pub updated_at: i64,
}

/// One row per family code holding the latest pushed snapshot.
pub trait RemoteStore: Send + Sync + 'static {
    /// Read the slot. `Ok(None)` when the family has never pushed.
    fn fetch_snapshot(
        &self,
        family_code: &str,
    ) -> impl Future<Output = RemoteResult<Option<RemoteRecord>>> + Send;

    /// Upsert the slot and return the modification time the remote stored.
    fn put_snapshot(
        &self,
        family_code: &str,
        snapshot: &Snapshot,
        updated_at: i64,
    ) -> impl Future<Output = RemoteResult<i64>> + Send;
}

/// Remote slot kept in memory, shared by every clone.
///
/// Stands in for the hosted table when several devices run in one process.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    slots: Mutex<HashMap<String, RemoteRecord>>,
    latency: std::sync::Mutex<Duration>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut current) = self.inner.latency.lock() {
            *current = latency;
        }
    }

    /// Make every call fail with [`RemoteError::Unavailable`] while `failing`
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.inner.puts.load(Ordering::SeqCst)
    }

    /// Store an arbitrary payload, bypassing the snapshot encoder.
    pub async fn insert_raw(&self, family_code: &str, payload: Value, updated_at: i64) {
        self.inner.slots.lock().await.insert(
            family_code.to_string(),
            RemoteRecord {
                payload,
                updated_at,
            },
        );
    }

    pub async fn record(&self, family_code: &str) -> Option<RemoteRecord> {
        self.inner.slots.lock().await.get(family_code).cloned()
    }

    async fn before_call(&self) -> RemoteResult<()> {
        let latency = self
            .inner
            .latency
            .lock()
            .map(|latency| *latency)
            .unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("memory remote is offline".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn fetch_snapshot(&self, family_code: &str) -> RemoteResult<Option<RemoteRecord>> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        Ok(self.record(family_code).await)
    }

    async fn put_snapshot(
        &self,
        family_code: &str,
        snapshot: &Snapshot,
        updated_at: i64,
    ) -> RemoteResult<i64> {
        self.inner.puts.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        let payload = serde_json::to_value(snapshot)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let mut slots = self.inner.slots.lock().await;
        // Server-assigned stamps never go backwards for a slot
        let stored_at = slots
            .get(family_code)
            .map_or(updated_at, |previous| {
                updated_at.max(previous.updated_at.saturating_add(1))
            });
        slots.insert(
            family_code.to_string(),
            RemoteRecord {
                payload,
                updated_at: stored_at,
            },
        );
        Ok(stored_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn missing_slot_fetches_none() {
        let remote = MemoryRemoteStore::new();
        assert_eq!(remote.fetch_snapshot("ABC123").await.unwrap(), None);
        assert_eq!(remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn put_then_fetch_returns_payload() {
        let remote = MemoryRemoteStore::new();
        let snapshot = Snapshot::empty(10);

        let stored = remote.put_snapshot("ABC123", &snapshot, 100).await.unwrap();
        assert_eq!(stored, 100);

        let record = remote.fetch_snapshot("ABC123").await.unwrap().unwrap();
        assert_eq!(record.updated_at, 100);
        assert_eq!(record.payload, snapshot.to_value().unwrap());
    }

    #[tokio::test]
    async fn stored_timestamps_increase_per_slot() {
        let remote = MemoryRemoteStore::new();
        let snapshot = Snapshot::empty(0);

        assert_eq!(remote.put_snapshot("A", &snapshot, 50).await.unwrap(), 50);
        assert_eq!(remote.put_snapshot("A", &snapshot, 40).await.unwrap(), 51);
        assert_eq!(remote.put_snapshot("B", &snapshot, 40).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn failing_remote_reports_unavailable() {
        let remote = MemoryRemoteStore::new();
        remote.set_failing(true);

        let error = remote.fetch_snapshot("A").await.unwrap_err();
        assert!(matches!(error, RemoteError::Unavailable(_)));

        remote.set_failing(false);
        assert!(remote.fetch_snapshot("A").await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_slots() {
        let remote = MemoryRemoteStore::new();
        let other = remote.clone();
        remote.put_snapshot("A", &Snapshot::empty(0), 7).await.unwrap();

        assert_eq!(other.record("A").await.map(|r| r.updated_at), Some(7));
    }
}
