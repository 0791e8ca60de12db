//! prikorm-core - Core library for Prikorm
//!
//! This crate contains the models, the local SQLite entity store and the
//! family sync engine (snapshot codec, last-write-wins merge, push/pull
//! scheduler) shared by every Prikorm interface.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{DayMetaOverride, LogEntry, LogKey, PlanOverride, Reaction};
pub use services::EntityStore;
pub use state::{SyncState, SyncStatus};
