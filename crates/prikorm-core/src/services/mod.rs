//! Async service layer shared by clients.

mod store;

pub use store::{EntityStore, MutationEvent, MutationOp, MutationOrigin, SyncSettings};
