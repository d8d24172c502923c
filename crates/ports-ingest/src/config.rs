//! Store and ingestion configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{decoder::DEFAULT_MAX_RECORD_BYTES, error::IngestError};

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Per-run ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Largest single port value the decoder will buffer
    pub max_record_bytes: usize,
    /// Optional wall-clock limit for one run
    pub deadline_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            deadline_secs: None,
        }
    }
}

impl StoreConfig {
    /// Load from the environment. `DATABASE_URL` is required.
    pub fn from_env() -> Result<Self, IngestError> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| IngestError::Config("DATABASE_URL environment missing".to_string()))?;

        let config = StoreConfig {
            url,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            connect_timeout_secs: parse_env("DATABASE_CONNECT_TIMEOUT")?
                .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_connections == 0 {
            return Err(IngestError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, IngestError> {
        let config = IngestConfig {
            max_record_bytes: parse_env("INGEST_MAX_RECORD_BYTES")?
                .unwrap_or(DEFAULT_MAX_RECORD_BYTES),
            deadline_secs: parse_env("INGEST_DEADLINE_SECS")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_record_bytes == 0 {
            return Err(IngestError::Config(
                "INGEST_MAX_RECORD_BYTES must be greater than 0".to_string(),
            ));
        }
        if self.deadline_secs == Some(0) {
            return Err(IngestError::Config(
                "INGEST_DEADLINE_SECS must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Parse an optional environment variable, rejecting values that are set but
/// unparsable instead of silently falling back to the default.
pub fn parse_env<T>(name: &str) -> Result<Option<T>, IngestError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| IngestError::Config(format!("Invalid {}='{}': {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
