use std::io;

use prikorm_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] prikorm_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("No family code configured. Run `prikorm family create` or `prikorm family join <CODE>`.")]
    FamilyNotConfigured,
    #[error(
        "Remote is not configured. Run `prikorm config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    RemoteNotConfigured,
}
