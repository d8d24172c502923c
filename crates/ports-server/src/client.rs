//! Client for the chunked stream endpoint

use reqwest::{Body, StatusCode};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::api::StreamAck;

/// Default size of each chunk sent to the server.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

const STREAM_PATH: &str = "/upload/stream";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected upload ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Sends a JSON document to a running server in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    endpoint: String,
    chunk_size: usize,
}

impl StreamClient {
    /// `addr` is either `host:port` or a base URL.
    pub fn new(addr: &str) -> Self {
        let base = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr.trim_end_matches('/'))
        };

        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}{}", base, STREAM_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn push_file(&self, path: &Path) -> Result<StreamAck, ClientError> {
        let file = tokio::fs::File::open(path).await?;
        info!(path = %path.display(), endpoint = %self.endpoint, "Pushing file");
        self.push(file).await
    }

    /// Send everything `reader` yields, then wait for the acknowledgement.
    pub async fn push<R>(&self, reader: R) -> Result<StreamAck, ClientError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let chunks = ReaderStream::with_capacity(reader, self.chunk_size);

        let response = self
            .http
            .put(&self.endpoint)
            .body(Body::wrap_stream(chunks))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, body });
        }

        Ok(response.json::<StreamAck>().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_host_port() {
        let client = StreamClient::new("localhost:8080");
        assert_eq!(client.endpoint(), "http://localhost:8080/upload/stream");
    }

    #[test]
    fn test_endpoint_from_url() {
        let client = StreamClient::new("https://ports.example.com/");
        assert_eq!(client.endpoint(), "https://ports.example.com/upload/stream");
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let client = StreamClient::new("localhost:8080").with_chunk_size(0);
        assert_eq!(client.chunk_size, 1);
    }
}
