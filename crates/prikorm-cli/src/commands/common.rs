use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use prikorm_core::config::RemoteConfig;
use prikorm_core::sync::SupabaseRemoteStore;
use prikorm_core::{EntityStore, LogEntry, LogKey};

use crate::cli::SlotArgs;
use crate::config::CliConfig;
use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PRIKORM_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prikorm")
        .join("prikorm.db")
}

pub fn open_store(db_path: &Path) -> Result<EntityStore, CliError> {
    Ok(EntityStore::open(db_path)?)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn slot_key(slot: &SlotArgs) -> LogKey {
    LogKey::new(slot.day, slot.date.unwrap_or_else(today), slot.time.trim())
}

pub fn join_words(words: &[String]) -> Result<String, CliError> {
    let text = words.join(" ");
    let text = text.trim();
    if text.is_empty() {
        return Err(CliError::InvalidArgument("text must not be empty".to_string()));
    }
    Ok(text.to_string())
}

/// Remote settings from the environment or `cli-config.json`.
pub fn resolve_remote_config() -> Result<Option<RemoteConfig>, CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    config
        .resolve_remote(|name| env::var(name).ok())
        .map_err(CliError::Config)
}

pub fn open_remote() -> Result<SupabaseRemoteStore, CliError> {
    let config = resolve_remote_config()?.ok_or(CliError::RemoteNotConfigured)?;
    Ok(SupabaseRemoteStore::new(config)?)
}

pub async fn require_family_code(store: &EntityStore) -> Result<String, CliError> {
    store
        .family_code()
        .await?
        .ok_or(CliError::FamilyNotConfigured)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_optional_timestamp(timestamp_ms: Option<i64>) -> String {
    timestamp_ms.map_or_else(|| "never".to_string(), format_timestamp)
}

pub fn format_log_lines(entries: &[LogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let mark = if entry.done { "x" } else { " " };
            let mut line = format!(
                "[{mark}] day {:<3} {}  {:<5}",
                entry.day_index, entry.date, entry.time
            );
            let details = [
                entry.plan_text.clone(),
                entry.amount.clone(),
                entry.reaction.map(|reaction| reaction.to_string()),
                entry.note.as_ref().map(|note| format!("\"{note}\"")),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
            if !details.is_empty() {
                line.push_str("  ");
                line.push_str(&details.join(" | "));
            }
            line
        })
        .collect()
}
