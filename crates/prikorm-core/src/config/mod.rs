//! Runtime configuration for the sync engine.
//!
//! Timings default to the values a phone client uses and can be tuned through
//! `PRIKORM_*` environment variables. Remote credentials come from
//! `SUPABASE_URL` / `SUPABASE_ANON_KEY`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::RemoteError;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_PUSH_DEBOUNCE: Duration = Duration::from_millis(1200);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(800);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_REMOTE_TABLE: &str = "family_state";

pub const PUSH_DEBOUNCE_ENV: &str = "PRIKORM_PUSH_DEBOUNCE_MS";
pub const SETTLE_DELAY_ENV: &str = "PRIKORM_SETTLE_DELAY_MS";
pub const POLL_INTERVAL_ENV: &str = "PRIKORM_POLL_INTERVAL_MS";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Timers driving the sync scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    /// Quiet period after the last local change before a push
    pub push_debounce: Duration,
    /// How long the applying-remote guard stays up after a successful merge
    pub settle_delay: Duration,
    /// Period of background pulls while online
    pub poll_interval: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            push_debounce: DEFAULT_PUSH_DEBOUNCE,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SyncTimings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build timings from a variable lookup. Missing, malformed, or zero
    /// values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|millis| *millis > 0)
                .map_or(default, Duration::from_millis)
        };

        Self {
            push_debounce: read(PUSH_DEBOUNCE_ENV, DEFAULT_PUSH_DEBOUNCE),
            settle_delay: read(SETTLE_DELAY_ENV, DEFAULT_SETTLE_DELAY),
            poll_interval: read(POLL_INTERVAL_ENV, DEFAULT_POLL_INTERVAL),
        }
    }
}

/// Hosted remote slot settings.
///
/// The anon key is a publishable client key, but it is still kept out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_REMOTE_TABLE.to_string()
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

impl RemoteConfig {
    /// Validate and normalize remote settings.
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        table: Option<String>,
    ) -> Result<Self, RemoteError> {
        let url = normalize_text_option(Some(url.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("remote URL must not be empty".to_string())
        })?;
        if !is_http_url(&url) {
            return Err(RemoteError::InvalidConfiguration(
                "remote URL must include http:// or https://".to_string(),
            ));
        }
        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("anon key must not be empty".to_string())
        })?;
        let table = normalize_text_option(table).unwrap_or_else(default_table);

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            table,
        })
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY`. `Ok(None)` when both are unset.
    pub fn from_env() -> Result<Option<Self>, RemoteError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, RemoteError> {
        let url = normalize_text_option(lookup(SUPABASE_URL_ENV));
        let anon_key = normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV));
        match (url, anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key, None).map(Some),
            (Some(_), None) => Err(RemoteError::InvalidConfiguration(format!(
                "{SUPABASE_ANON_KEY_ENV} is required when {SUPABASE_URL_ENV} is set"
            ))),
            (None, Some(_)) => Err(RemoteError::InvalidConfiguration(format!(
                "{SUPABASE_URL_ENV} is required when {SUPABASE_ANON_KEY_ENV} is set"
            ))),
        }
    }

    /// PostgREST endpoint of the slot table.
    pub fn rest_endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }
}
