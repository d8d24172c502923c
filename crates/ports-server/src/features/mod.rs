//! Feature routes and shared handler state

use axum::{extract::DefaultBodyLimit, extract::State, routing::get, Json, Router};
use ports_ingest::pipeline::Pipeline;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{error::AppError, middleware};

pub mod ingest;

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Cancelled when the server shuts down; every run token derives from it.
    pub shutdown: CancellationToken,
    /// Wall-clock limit applied to each run
    pub deadline: Option<Duration>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            shutdown,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Full application router with middleware applied.
pub fn router(state: AppState, upload_body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(ingest::ingest_routes())
        .with_state(state)
        // Multipart uploads are capped by the layer below instead of axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::body_limit_layer(upload_body_limit))
        .layer(middleware::tracing_layer())
}

async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state
        .pipeline
        .store()
        .health()
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok(Json(json!({
        "status": "healthy",
        "store": "connected"
    })))
}
