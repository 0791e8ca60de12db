//! Data models for Prikorm

mod day_meta;
mod family;
mod log_entry;
mod plan_override;

pub use day_meta::DayMetaOverride;
pub use family::{generate_family_code, normalize_family_code, FAMILY_CODE_LEN};
pub use log_entry::{LogDetails, LogEntry, LogKey, Reaction};
pub use plan_override::PlanOverride;

/// The three synchronized entity tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Logs,
    PlanOverrides,
    DayMeta,
}

impl EntityKind {
    /// Wire/table name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::PlanOverrides => "planOverrides",
            Self::DayMeta => "dayMeta",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day indices start at 1.
pub(crate) fn check_day_index(day_index: u32) -> crate::Result<()> {
    if day_index == 0 {
        return Err(crate::Error::InvalidInput(
            "day index must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_time_label(time: &str) -> crate::Result<()> {
    if time.trim().is_empty() {
        return Err(crate::Error::InvalidInput(
            "time of day must not be empty".to_string(),
        ));
    }
    Ok(())
}
