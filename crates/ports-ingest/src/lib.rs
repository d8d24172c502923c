//! Ports Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams a single JSON object of `port key -> port record` members into a
//! `ports` table, one record at a time.
//!
//! # Overview
//!
//! - **Model** ([`model`]): `RawPort` as decoded, `StoredPort` as persisted,
//!   and the validating conversion between them
//! - **Decoder** ([`decoder`]): incremental, forward-only parser over any
//!   `AsyncBufRead`; memory stays bounded by a single record
//! - **Pipeline** ([`pipeline`]): decode, convert and upsert loop with
//!   per-record failure isolation and cooperative cancellation
//! - **Store** ([`store`]): the `PortStore` upsert port, with PostgreSQL and
//!   in-memory implementations
//!
//! # Example
//!
//! ```no_run
//! use ports_ingest::{decoder::PortDecoder, pipeline::Pipeline, store::MemoryPortStore};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let file = tokio::fs::File::open("ports.json").await?;
//!     let mut decoder = PortDecoder::new(tokio::io::BufReader::new(file)).await?;
//!
//!     let pipeline = Pipeline::new(Arc::new(MemoryPortStore::new()));
//!     let summary = pipeline.run(&mut decoder, &CancellationToken::new()).await?;
//!     println!("stored {} ports", summary.stored);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;

// Re-export commonly used types
pub use error::{IngestError, IngestResult};
pub use model::{InvalidPortError, RawPort, StoredPort};
