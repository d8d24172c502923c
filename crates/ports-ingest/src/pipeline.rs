//! Decode, convert and store loop
//!
//! A run pulls one port at a time from a [`PortSource`], converts it and
//! awaits its upsert before pulling the next, so exactly one record is in
//! flight. Failures of a single port are logged, counted and skipped:
//!
//! | failure                      | effect                         |
//! |------------------------------|--------------------------------|
//! | recoverable [`DecodeError`]  | port skipped, run continues    |
//! | [`InvalidPortError`]         | port skipped, run continues    |
//! | [`StoreError`]               | port skipped, no retry         |
//! | unrecoverable decode error   | run ends with `IngestError`    |
//!
//! Cancellation is cooperative. The token is checked between ports and may
//! interrupt a pending read, but an upsert that has started always finishes,
//! so the store ends up holding a prefix of the input.
//!
//! [`InvalidPortError`]: crate::model::InvalidPortError
//! [`StoreError`]: crate::store::StoreError

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration, time::Instant};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    decoder::{DecodeError, PortDecoder, DEFAULT_MAX_RECORD_BYTES},
    error::IngestError,
    model::{RawPort, StoredPort},
    store::PortStore,
};

/// Number of failures kept verbatim in a [`RunSummary`].
pub const MAX_SAMPLE_FAILURES: usize = 5;

/// Lazy, finite, non-restartable sequence of raw ports.
#[async_trait]
pub trait PortSource: Send {
    async fn has_next(&mut self) -> Result<bool, DecodeError>;

    async fn next(&mut self) -> Result<RawPort, DecodeError>;
}

#[async_trait]
impl<R> PortSource for PortDecoder<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn has_next(&mut self) -> Result<bool, DecodeError> {
        PortDecoder::has_next(self).await
    }

    async fn next(&mut self) -> Result<RawPort, DecodeError> {
        PortDecoder::next(self).await
    }
}

/// Stage at which a port was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Decode,
    Validate,
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub key: Option<String>,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of a run that was not aborted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ports decoded into the record shape
    pub decoded: usize,
    pub stored: usize,
    /// Decoded ports that failed validation
    pub rejected: usize,
    pub decode_failures: usize,
    pub store_failures: usize,
    pub cancelled: bool,
    /// First few failures, for diagnostics
    pub failures: Vec<RecordFailure>,
}

impl RunSummary {
    /// Total ports dropped for any reason.
    pub fn dropped(&self) -> usize {
        self.rejected + self.decode_failures + self.store_failures
    }

    fn note(&mut self, key: Option<&str>, stage: FailureStage, message: String) {
        match stage {
            FailureStage::Decode => self.decode_failures += 1,
            FailureStage::Validate => self.rejected += 1,
            FailureStage::Store => self.store_failures += 1,
        }
        if self.failures.len() < MAX_SAMPLE_FAILURES {
            self.failures.push(RecordFailure {
                key: key.map(str::to_string),
                stage,
                message,
            });
        }
    }
}

/// Drives a source into a [`PortStore`].
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn PortStore>,
    max_record_bytes: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("max_record_bytes", &self.max_record_bytes)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(store: Arc<dyn PortStore>) -> Self {
        Self {
            store,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// Limit applied to each value by decoders built in [`Pipeline::ingest`].
    pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
        self.max_record_bytes = max_record_bytes;
        self
    }

    pub fn store(&self) -> &Arc<dyn PortStore> {
        &self.store
    }

    /// Open a decoder over `reader` and run it to completion.
    ///
    /// Empty or non-object input fails before any port is processed.
    pub async fn ingest<R>(
        &self,
        reader: R,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, IngestError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut decoder = PortDecoder::with_max_record_bytes(reader, self.max_record_bytes).await?;
        self.run(&mut decoder, cancel).await
    }

    /// Process `source` until it is exhausted, `cancel` fires, or it fails
    /// unrecoverably.
    #[tracing::instrument(name = "ingest_run", skip_all)]
    pub async fn run<S>(
        &self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, IngestError>
    where
        S: PortSource + ?Sized,
    {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let pulled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                pulled = pull(source) => pulled,
            };

            let raw = match pulled {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    warn!(key = e.key().unwrap_or_default(), error = %e, "Port decode failed");
                    summary.note(e.key(), FailureStage::Decode, e.to_string());
                    continue;
                },
                Err(e) => {
                    error!(
                        error = %e,
                        stored = summary.stored,
                        dropped = summary.dropped(),
                        "Input cannot be decoded further, aborting run"
                    );
                    return Err(IngestError::Decode(e));
                },
            };
            summary.decoded += 1;

            let port = match StoredPort::try_from(raw) {
                Ok(port) => port,
                Err(e) => {
                    warn!(key = %e.key, error = %e, "Port translation failed");
                    summary.note(Some(&e.key), FailureStage::Validate, e.to_string());
                    continue;
                },
            };

            match self.store.upsert(&port).await {
                Ok(()) => summary.stored += 1,
                Err(e) => {
                    error!(key = %port.key, error = %e, "Port upsert failed");
                    summary.note(Some(&port.key), FailureStage::Store, e.to_string());
                },
            }
        }

        info!(
            decoded = summary.decoded,
            stored = summary.stored,
            dropped = summary.dropped(),
            cancelled = summary.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion run finished"
        );

        Ok(summary)
    }
}

async fn pull<S>(source: &mut S) -> Result<Option<RawPort>, DecodeError>
where
    S: PortSource + ?Sized,
{
    if !source.has_next().await? {
        return Ok(None);
    }
    source.next().await.map(Some)
}

/// Child of `parent` that is additionally cancelled once `deadline` elapses.
///
/// A run bounded this way stops exactly as if it had been cancelled. Cancel
/// the returned token (or drop a guard on it) once the run is over so the
/// timer task exits early.
pub fn with_deadline(parent: &CancellationToken, deadline: Option<Duration>) -> CancellationToken {
    let token = parent.child_token();

    if let Some(deadline) = deadline {
        let timer = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {},
                _ = tokio::time::sleep(deadline) => {
                    warn!(deadline_secs = deadline.as_secs_f64(), "Run deadline exceeded, cancelling");
                    timer.cancel();
                }
            }
        });
    }

    token
}
