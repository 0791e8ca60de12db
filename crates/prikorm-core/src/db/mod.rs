//! Database layer for Prikorm

mod connection;
mod log_repository;
mod migrations;
mod override_repository;
mod settings_repository;

pub use connection::Database;
pub use log_repository::{LogRepository, SqliteLogRepository};
pub use override_repository::{
    DayMetaRepository, PlanOverrideRepository, SqliteDayMetaRepository,
    SqlitePlanOverrideRepository,
};
pub use settings_repository::{keys, SettingsRepository, SqliteSettingsRepository};
