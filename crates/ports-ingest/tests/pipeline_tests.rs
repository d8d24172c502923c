//! Pipeline integration tests
//!
//! Runs the decode, convert and upsert loop against the in-memory store and
//! a few purpose-built stores and sources:
//! - Per-record failure isolation (decode, validation, store)
//! - Fatal decode errors and the committed prefix they leave behind
//! - Cancellation and deadlines

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ports_ingest::{
    decoder::DecodeError,
    pipeline::{with_deadline, FailureStage, Pipeline, PortSource},
    store::{MemoryPortStore, PortStore, StoreError},
    IngestError, RawPort, StoredPort,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

const SCENARIO: &str = r#"{"AEAAB":{"name":"Abu al Bukhoosh","coordinates":[53.16667,25.55]},"BAD":{"coordinates":[1.0]}}"#;

fn memory_pipeline() -> (Arc<MemoryPortStore>, Pipeline) {
    let store = Arc::new(MemoryPortStore::new());
    let pipeline = Pipeline::new(store.clone());
    (store, pipeline)
}

fn document(count: usize) -> String {
    let members: Vec<String> = (0..count)
        .map(|i| format!(r#""P{:04}":{{"name":"Port {}","coordinates":[{}.5,{}.25]}}"#, i, i, i, i))
        .collect();
    format!("{{{}}}", members.join(","))
}

/// Fails every upsert for one key, delegating the rest.
struct FlakyStore {
    inner: MemoryPortStore,
    failing_key: &'static str,
}

#[async_trait]
impl PortStore for FlakyStore {
    async fn upsert(&self, port: &StoredPort) -> Result<(), StoreError> {
        if port.key == self.failing_key {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.upsert(port).await
    }
}

/// Cancels a token once a given number of upserts have completed.
struct CancellingStore {
    inner: MemoryPortStore,
    cancel_after: usize,
    writes: AtomicUsize,
    token: CancellationToken,
}

#[async_trait]
impl PortStore for CancellingStore {
    async fn upsert(&self, port: &StoredPort) -> Result<(), StoreError> {
        self.inner.upsert(port).await?;
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_after {
            self.token.cancel();
        }
        Ok(())
    }
}

/// Yields one port, then never answers again.
struct StalledSource {
    yielded: bool,
}

#[async_trait]
impl PortSource for StalledSource {
    async fn has_next(&mut self) -> Result<bool, DecodeError> {
        if self.yielded {
            std::future::pending::<()>().await;
        }
        Ok(true)
    }

    async fn next(&mut self) -> Result<RawPort, DecodeError> {
        self.yielded = true;
        Ok(RawPort {
            key: "AEAJM".to_string(),
            name: "Ajman".to_string(),
            coordinates: vec![55.5136433, 25.4052165],
            ..RawPort::default()
        })
    }
}

// ============================================================================
// Failure Isolation Tests
// ============================================================================

#[tokio::test]
async fn test_concrete_scenario() {
    let (store, pipeline) = memory_pipeline();

    let summary = pipeline
        .ingest(SCENARIO.as_bytes(), &CancellationToken::new())
        .await
        .expect("Invalid coordinates must not abort the run");

    assert_eq!(summary.decoded, 2);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.rejected, 1);
    assert!(!summary.cancelled);

    let failure = &summary.failures[0];
    assert_eq!(failure.key.as_deref(), Some("BAD"));
    assert_eq!(failure.stage, FailureStage::Validate);

    assert_eq!(store.len(), 1);
    let port = store.get("AEAAB").unwrap();
    assert_eq!(port.name, "Abu al Bukhoosh");
    assert_eq!(port.latitude, 53.16667);
    assert_eq!(port.longitude, 25.55);
}

#[tokio::test]
async fn test_all_rejected_still_succeeds() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A":{"coordinates":[]},"B":{},"C":{"coordinates":[1,2,3]}}"#;

    let summary = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stored, 0);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.dropped(), 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_value_shape_error_skips_one_port() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A":{"coordinates":"north"},"B":{"coordinates":[1,2]}}"#;

    let summary = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.failures[0].key.as_deref(), Some("A"));
    assert_eq!(summary.failures[0].stage, FailureStage::Decode);
    assert_eq!(summary.stored, 1);
    assert!(store.get("B").is_some());
}

#[tokio::test]
async fn test_oversized_port_is_skipped() {
    let store = Arc::new(MemoryPortStore::new());
    let pipeline = Pipeline::new(store.clone()).with_max_record_bytes(64);
    let padding = "x".repeat(256);
    let input = format!(
        r#"{{"BIG":{{"name":"{}","coordinates":[1,2]}},"SMALL":{{"coordinates":[3,4]}}}}"#,
        padding
    );

    let summary = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.stored, 1);
    assert!(store.get("BIG").is_none());
    assert!(store.get("SMALL").is_some());
}

#[tokio::test]
async fn test_store_failure_is_not_fatal() {
    let store = Arc::new(FlakyStore {
        inner: MemoryPortStore::new(),
        failing_key: "P0001",
    });
    let pipeline = Pipeline::new(store.clone());

    let summary = pipeline
        .ingest(document(3).as_bytes(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.decoded, 3);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.store_failures, 1);
    assert_eq!(summary.failures[0].stage, FailureStage::Store);
    assert_eq!(store.inner.write_log(), vec!["P0000", "P0002"]);
}

#[tokio::test]
async fn test_failure_sample_is_capped() {
    let (_store, pipeline) = memory_pipeline();
    let members: Vec<String> = (0..20).map(|i| format!(r#""B{}":{{}}"#, i)).collect();
    let input = format!("{{{}}}", members.join(","));

    let summary = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.rejected, 20);
    assert_eq!(summary.failures.len(), ports_ingest::pipeline::MAX_SAMPLE_FAILURES);
}

// ============================================================================
// Fatal Error Tests
// ============================================================================

#[tokio::test]
async fn test_empty_input_writes_nothing() {
    let (store, pipeline) = memory_pipeline();

    let result = pipeline.ingest(&b""[..], &CancellationToken::new()).await;

    assert!(matches!(result, Err(IngestError::Decode(DecodeError::EmptyInput))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_non_object_input_is_rejected() {
    let (store, pipeline) = memory_pipeline();

    let result = pipeline
        .ingest(&b"[1, 2, 3]"[..], &CancellationToken::new())
        .await;

    let err = result.unwrap_err();
    assert!(err.is_input_error());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_fatal_decode_keeps_committed_prefix() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A":{"coordinates":[1,2]},"B":{"coordinates":[3,4]} "C":{"coordinates":[5,6]}}"#;

    let result = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(IngestError::Decode(DecodeError::MalformedInput(_)))
    ));
    assert_eq!(store.write_log(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_bare_value_swallowing_members_is_fatal() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A": t{"x":1}, "B": {"coordinates":[1,2]}, "C": {"coordinates":[3,4]}}"#;

    let result = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(IngestError::Decode(DecodeError::MalformedInput(_)))
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_mismatched_bracket_is_fatal() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A": {"x": [1}, "B": {"coordinates":[1,2]}], "C": {"coordinates":[3,4]}}"#;

    let result = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(IngestError::Decode(DecodeError::MalformedInput(_)))
    ));
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn test_syntax_error_in_later_value_keeps_prefix() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A":{"coordinates":[1,2]},"B":{"name": },"C":{"coordinates":[3,4]}}"#;

    let result = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(IngestError::Decode(DecodeError::MalformedInput(_)))
    ));
    assert_eq!(store.write_log(), vec!["A"]);
}

#[tokio::test]
async fn test_truncated_input_is_fatal() {
    let (store, pipeline) = memory_pipeline();
    let input = r#"{"A":{"coordinates":[1,2]},"B":{"name":"Tru"#;

    let result = pipeline
        .ingest(input.as_bytes(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(IngestError::Decode(DecodeError::UnexpectedEof))
    ));
    assert_eq!(store.len(), 1);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let (store, pipeline) = memory_pipeline();
    let token = CancellationToken::new();
    token.cancel();

    let summary = pipeline.ingest(document(5).as_bytes(), &token).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.decoded, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_cancellation_leaves_input_prefix() {
    for cancel_after in [1, 4, 9] {
        let token = CancellationToken::new();
        let store = Arc::new(CancellingStore {
            inner: MemoryPortStore::new(),
            cancel_after,
            writes: AtomicUsize::new(0),
            token: token.clone(),
        });
        let pipeline = Pipeline::new(store.clone());

        let summary = pipeline.ingest(document(10).as_bytes(), &token).await.unwrap();

        let expected: Vec<String> = (0..cancel_after).map(|i| format!("P{:04}", i)).collect();
        assert!(summary.cancelled);
        assert_eq!(summary.stored, cancel_after);
        assert_eq!(store.inner.write_log(), expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_stalled_source() {
    let (store, pipeline) = memory_pipeline();
    let parent = CancellationToken::new();
    let token = with_deadline(&parent, Some(Duration::from_secs(5)));
    let mut source = StalledSource { yielded: false };

    let summary = tokio::time::timeout(Duration::from_secs(60), pipeline.run(&mut source, &token))
        .await
        .expect("Deadline should end the run")
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.stored, 1);
    assert!(store.get("AEAJM").is_some());
    assert!(!parent.is_cancelled());
}

#[tokio::test]
async fn test_parent_cancellation_reaches_deadline_token() {
    let parent = CancellationToken::new();
    let token = with_deadline(&parent, None);

    parent.cancel();

    assert!(token.is_cancelled());
}
