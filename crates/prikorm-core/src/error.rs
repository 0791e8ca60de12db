//! Error types for prikorm-core

use thiserror::Error;

/// Result type alias using prikorm-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in prikorm-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store unreachable or rejected the request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote payload lacks the snapshot envelope entirely
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<crate::sync::RemoteError> for Error {
    fn from(error: crate::sync::RemoteError) -> Self {
        Self::Transport(error.to_string())
    }
}
