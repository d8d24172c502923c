//! Port store interface
//!
//! The pipeline only ever needs one capability from persistence: replace the
//! row for a port key with a new one. [`PortStore`] is that seam; connection
//! handling and schema management live with the concrete implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::StoredPort;

pub mod memory;
pub mod postgres;

pub use memory::MemoryPortStore;
pub use postgres::PgPortStore;

/// Failure of a single store operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Insert-or-replace persistence for ports.
#[async_trait]
pub trait PortStore: Send + Sync {
    /// Write `port`, replacing every column of an existing row with the same
    /// key. Writing the same port twice leaves a single identical row.
    async fn upsert(&self, port: &StoredPort) -> Result<(), StoreError>;

    /// Cheap reachability probe used by health checks.
    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
