//! Response envelopes shared by every endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ports_ingest::pipeline::RunSummary;
use serde::{Deserialize, Serialize};

/// Success envelope: `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Completion acknowledgement of the chunked stream endpoint:
/// `{"result": "ok", <summary fields>}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamAck {
    pub result: String,
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl StreamAck {
    pub fn ok(summary: RunSummary) -> Self {
        Self {
            result: "ok".to_string(),
            summary,
        }
    }
}

/// Failure envelope: `{"success": false, "error": {"code", "message", ...}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("INVALID_INPUT", "Empty input")).unwrap();

        assert_eq!(
            body,
            json!({
                "success": false,
                "error": { "code": "INVALID_INPUT", "message": "Empty input" }
            })
        );
    }

    #[test]
    fn test_stream_ack_is_flat() {
        let ack = StreamAck::ok(RunSummary {
            decoded: 2,
            stored: 1,
            rejected: 1,
            ..RunSummary::default()
        });

        let body = serde_json::to_value(&ack).unwrap();
        assert_eq!(body["result"], "ok");
        assert_eq!(body["stored"], 1);
        assert_eq!(body["rejected"], 1);

        let parsed: StreamAck = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.summary, ack.summary);
    }

    #[test]
    fn test_error_response_details() {
        let response =
            ErrorResponse::new("CANCELLED", "Run cancelled").with_details(json!({ "stored": 3 }));

        assert_eq!(response.error.details, Some(json!({ "stored": 3 })));
    }
}
