//! Middleware for the ports server
//!
//! - Request logging with tracing
//! - Request body size limit

use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

/// Create tracing/logging layer
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

/// Reject request bodies larger than `limit` bytes.
///
/// Declared lengths over the limit get a 413 up front. Chunked bodies fail
/// while streaming once they cross it.
pub fn body_limit_layer(limit: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit)
}
