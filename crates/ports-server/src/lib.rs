//! Ports Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Network front ends for the ports ingestion pipeline.
//!
//! # Overview
//!
//! - **Multipart upload**: `PUT /upload` reads the `file` form field and
//!   streams it through the pipeline while it is still arriving
//! - **Chunked stream**: `PUT /upload/stream` spools a chunked request body to
//!   a temporary file, then ingests the spool once the client is done
//! - **Health**: `GET /health` probes the port store
//! - **Push client**: [`client::StreamClient`] sends a local file to the
//!   chunked stream endpoint
//!
//! Every run gets its own cancellation token, a child of the server's
//! shutdown token. A client that goes away mid-upload cancels its run at the
//! next record boundary.
//!
//! # Example
//!
//! ```no_run
//! use ports_ingest::{pipeline::Pipeline, store::MemoryPortStore};
//! use ports_server::features::{self, AppState};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = AppState::new(
//!         Pipeline::new(Arc::new(MemoryPortStore::new())),
//!         CancellationToken::new(),
//!     );
//!     let app = features::router(state, 64 * 1024 * 1024);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
