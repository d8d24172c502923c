use axum::{
    body::Body,
    extract::{Multipart, State},
    routing::put,
    Json, Router,
};
use futures::TryStreamExt;
use http_body_util::LengthLimitError;
use ports_ingest::pipeline::RunSummary;
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, info};

use super::task::IngestTask;
use crate::{
    api::{ApiResponse, StreamAck},
    error::AppError,
    features::AppState,
};

/// Form field carrying the JSON document
pub const UPLOAD_FIELD: &str = "file";

/// Bytes buffered between the multipart reader and the decoder.
const PIPE_CAPACITY: usize = 64 * 1024;

pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", put(upload_multipart))
        .route("/upload/stream", put(upload_stream))
}

/// Stream the `file` field into the pipeline while it is still arriving.
#[tracing::instrument(skip_all)]
async fn upload_multipart(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ApiResponse<RunSummary>, AppError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let (mut writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let task = IngestTask::spawn(&state, BufReader::new(reader));

        let mut received = 0usize;
        while let Some(chunk) = field.chunk().await? {
            received += chunk.len();
            // The run ended early and dropped its reader; its result says why.
            if writer.write_all(&chunk).await.is_err() {
                break;
            }
        }
        drop(writer);

        if received == 0 {
            return Err(AppError::BadRequest(format!(
                "Form field '{}' is empty",
                UPLOAD_FIELD
            )));
        }

        let summary = task.finish().await?;
        info!(
            bytes = received,
            stored = summary.stored,
            dropped = summary.dropped(),
            "Multipart upload ingested"
        );
        return Ok(ApiResponse::success(summary));
    }

    Err(AppError::BadRequest(format!(
        "Missing form field '{}'",
        UPLOAD_FIELD
    )))
}

/// A body cut off by the size limit is reported as 413, anything else as 400.
fn body_error(e: axum::Error) -> AppError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(inner) = source {
        if inner.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge(format!("Request body {}", inner));
        }
        source = inner.source();
    }
    AppError::BadRequest(format!("Failed to read request body: {}", e))
}

/// Spool a chunked body to a temporary file, then ingest the spool.
#[tracing::instrument(skip_all)]
async fn upload_stream(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<StreamAck>, AppError> {
    let spool = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create spool file: {}", e)))??;
    let mut spool = File::from_std(spool);

    let mut chunks = body.into_data_stream();
    let mut received = 0usize;
    let mut count = 0usize;
    while let Some(chunk) = chunks
        .try_next()
        .await
        .map_err(body_error)?
    {
        spool.write_all(&chunk).await?;
        received += chunk.len();
        count += 1;
    }
    spool.flush().await?;
    spool.rewind().await?;
    debug!(bytes = received, chunks = count, "Upload spooled");

    let summary = IngestTask::spawn(&state, BufReader::new(spool))
        .finish()
        .await?;
    info!(
        bytes = received,
        stored = summary.stored,
        dropped = summary.dropped(),
        "Stream upload ingested"
    );

    Ok(Json(StreamAck::ok(summary)))
}
