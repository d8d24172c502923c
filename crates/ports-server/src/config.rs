//! Configuration management

use ports_ingest::config::{parse_env, IngestConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default time allowed for in-flight requests after a shutdown signal.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 3;

/// Default cap on a single request body (1 GiB).
pub const DEFAULT_UPLOAD_BODY_LIMIT: usize = 1024 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub ingest: IngestConfig,
}

/// Listener and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub upload_body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            upload_body_limit: DEFAULT_UPLOAD_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .filter(|host| !host.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            port: parse_env("PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT")?
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            upload_body_limit: parse_env("UPLOAD_BODY_LIMIT")?
                .unwrap_or(DEFAULT_UPLOAD_BODY_LIMIT),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        let config = Config {
            server: ServerConfig::from_env()?,
            store: StoreConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.server.upload_body_limit == 0 {
            anyhow::bail!("UPLOAD_BODY_LIMIT must be greater than 0");
        }

        self.store.validate()?;
        self.ingest.validate()?;

        Ok(())
    }
}
