//! Stream client tests against a live server
//!
//! Serves the router on an ephemeral port and pushes documents through
//! [`StreamClient`] over real HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ports_ingest::{pipeline::Pipeline, store::MemoryPortStore};
use ports_server::{
    client::{ClientError, StreamClient},
    features::{self, AppState},
};
use reqwest::StatusCode;
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;

const BODY_LIMIT: usize = 16 * 1024 * 1024;
const SCENARIO: &str = r#"{"AEAAB":{"name":"Abu al Bukhoosh","coordinates":[53.16667,25.55]},"BAD":{"coordinates":[1.0]}}"#;

async fn spawn_server() -> (SocketAddr, Arc<MemoryPortStore>) {
    let store = Arc::new(MemoryPortStore::new());
    let state = AppState::new(Pipeline::new(store.clone()), CancellationToken::new());
    let app = features::router(state, BODY_LIMIT);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, store)
}

#[tokio::test]
async fn test_push_in_small_chunks() {
    let (addr, store) = spawn_server().await;

    let ack = StreamClient::new(&addr.to_string())
        .with_chunk_size(8)
        .push(SCENARIO.as_bytes())
        .await
        .unwrap();

    assert_eq!(ack.result, "ok");
    assert_eq!(ack.summary.decoded, 2);
    assert_eq!(ack.summary.stored, 1);
    assert_eq!(ack.summary.rejected, 1);

    let port = store.get("AEAAB").unwrap();
    assert_eq!(port.name, "Abu al Bukhoosh");
    assert_eq!(port.latitude, 53.16667);
    assert_eq!(port.longitude, 25.55);
}

#[tokio::test]
async fn test_push_file() {
    let (addr, store) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ports.json");
    std::fs::write(&path, SCENARIO).unwrap();

    let ack = StreamClient::new(&format!("http://{}/", addr))
        .push_file(&path)
        .await
        .unwrap();

    assert_eq!(ack.summary.stored, 1);
    assert!(store.get("AEAAB").is_some());
}

#[tokio::test]
async fn test_push_empty_document_is_rejected() {
    let (addr, store) = spawn_server().await;

    let err = StreamClient::new(&addr.to_string())
        .push(&b""[..])
        .await
        .unwrap_err();

    match err {
        ClientError::Rejected { status, body } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("INVALID_INPUT"));
        },
        other => panic!("expected a rejection, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_push_to_closed_port_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = StreamClient::new(&addr.to_string())
        .push(SCENARIO.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Http(_)));
}
