//! Family sync engine.
//!
//! A family shares one remote slot holding the latest [`Snapshot`] of every
//! device's entity tables. Devices push their full snapshot (debounced on
//! local edits) and periodically pull the slot, folding it into the local
//! store with a last-write-wins merge keyed on each entity's natural key.

mod merge;
mod remote;
mod scheduler;
mod snapshot;
mod supabase;

pub use merge::{plan_merge, KindReport, MergeAction, MergeReport, Mergeable};
pub use remote::{MemoryRemoteStore, RemoteError, RemoteRecord, RemoteResult, RemoteStore};
pub use scheduler::{PullOutcome, PushOutcome, SkipReason, SyncScheduler};
pub use snapshot::{import_snapshot, Snapshot, SNAPSHOT_VERSION};
pub use supabase::SupabaseRemoteStore;

pub(crate) use merge::apply_snapshot;
pub(crate) use snapshot::read_snapshot;
