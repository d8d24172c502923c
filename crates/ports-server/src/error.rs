//! Server-specific error types

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ports_ingest::{pipeline::RunSummary, IngestError};
use thiserror::Error;

use crate::api::ErrorResponse;

/// Errors a handler turns into an HTTP response
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// The run stopped early on shutdown or deadline.
    #[error("Ingestion cancelled after {} stored ports", .0.stored)]
    Cancelled(RunSummary),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(ref message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("BAD_REQUEST", message.clone()))
            },
            AppError::PayloadTooLarge(ref message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse::new("PAYLOAD_TOO_LARGE", message.clone()),
            ),
            AppError::Multipart(ref e) => {
                (e.status(), ErrorResponse::new("MULTIPART_ERROR", e.body_text()))
            },
            AppError::Ingest(ref e) if e.is_input_error() => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("INVALID_INPUT", e.to_string()))
            },
            AppError::Ingest(ref e) => {
                tracing::error!(error = %e, "Ingestion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INGEST_ERROR", "An ingestion error occurred"),
                )
            },
            AppError::Cancelled(ref summary) => {
                let details = serde_json::to_value(summary).unwrap_or_default();
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("CANCELLED", self.to_string()).with_details(details),
                )
            },
            AppError::Unavailable(ref message) => {
                tracing::warn!(error = %message, "Store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("UNAVAILABLE", "The port store is unavailable"),
                )
            },
            AppError::Io(ref e) => {
                tracing::error!(error = %e, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("IO_ERROR", "An IO error occurred"),
                )
            },
            AppError::Internal(ref message) => {
                tracing::error!(error = %message, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("INTERNAL_ERROR", message.clone()))
            },
        };

        (status, Json(error)).into_response()
    }
}
