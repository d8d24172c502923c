//! Ingestion endpoints
//!
//! | route                 | body                        | reply                      |
//! |-----------------------|-----------------------------|----------------------------|
//! | `PUT /upload`         | multipart, field `file`     | `ApiResponse<RunSummary>`  |
//! | `PUT /upload/stream`  | raw bytes, chunked transfer | `StreamAck`                |

pub mod routes;
mod task;

pub use routes::{ingest_routes, UPLOAD_FIELD};
