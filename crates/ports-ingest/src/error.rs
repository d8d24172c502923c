//! Run-level error types

use thiserror::Error;

use crate::decoder::DecodeError;

/// Result type alias for ingestion runs
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Errors that abort an ingestion run.
///
/// Per-record failures (`InvalidPortError`, `StoreError`, recoverable
/// `DecodeError`s) never surface here; they are logged and counted in the
/// run summary instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to the port store: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Whether the failure lies in the submitted document rather than in the
    /// service. Transports use this to pick a client or server error status.
    pub fn is_input_error(&self) -> bool {
        match self {
            IngestError::Decode(e) => !matches!(e, DecodeError::Io(_)),
            _ => false,
        }
    }
}
