//! Ports Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared process plumbing for the ports workspace members:
//!
//! - **Logging**: one `tracing` subscriber setup for every binary
//! - **Shutdown**: a future resolving on Ctrl+C or SIGTERM
//!
//! # Example
//!
//! ```no_run
//! use ports_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod shutdown;
