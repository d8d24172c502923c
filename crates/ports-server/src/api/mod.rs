//! HTTP API envelopes

pub mod response;

pub use response::{ApiResponse, ErrorDetail, ErrorResponse, StreamAck};
