//! Observable sync state shared by every client.

use std::fmt;
use std::str::FromStr;

/// Coarse sync status, persisted for observability surfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    Ok,
    Error,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = std::convert::Infallible;

    /// Unknown values read as `Idle`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "ok" => Self::Ok,
            "error" => Self::Error,
            _ => Self::Idle,
        })
    }
}

/// Snapshot of the scheduler's observable fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Last remote `updated_at` applied or written by this device (Unix ms)
    pub remote_updated_at: Option<i64>,
    pub last_push_at: Option<i64>,
    pub last_pull_at: Option<i64>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// Whether a remote write stamped `remote_ts` is newer than the baseline.
    pub fn is_newer_than_baseline(&self, remote_ts: i64) -> bool {
        self.remote_updated_at
            .map_or(true, |baseline| remote_ts > baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_reads_as_idle() {
        assert_eq!("bogus".parse::<SyncState>().unwrap(), SyncState::Idle);
        assert_eq!("error".parse::<SyncState>().unwrap(), SyncState::Error);
    }

    #[test]
    fn baseline_comparison_is_strict() {
        let status = SyncStatus {
            remote_updated_at: Some(500),
            ..SyncStatus::default()
        };
        assert!(!status.is_newer_than_baseline(499));
        assert!(!status.is_newer_than_baseline(500));
        assert!(status.is_newer_than_baseline(501));
        assert!(SyncStatus::default().is_newer_than_baseline(0));
    }
}
