use ports_ingest::{
    pipeline::{with_deadline, RunSummary},
    IngestError,
};
use tokio::{io::AsyncBufRead, task::JoinHandle};
use tokio_util::sync::DropGuard;

use crate::{error::AppError, features::AppState};

/// A pipeline run on its own task, tied to the request that started it.
///
/// Dropping an unfinished `IngestTask` (the client went away and axum dropped
/// the handler) cancels the run at the next record boundary. The task itself
/// keeps going until then, so a started upsert always completes.
pub(crate) struct IngestTask {
    handle: JoinHandle<Result<RunSummary, IngestError>>,
    guard: DropGuard,
}

impl IngestTask {
    pub(crate) fn spawn<R>(state: &AppState, reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let token = with_deadline(&state.shutdown, state.deadline);
        let guard = token.clone().drop_guard();
        let pipeline = state.pipeline.clone();

        let handle = tokio::spawn(async move { pipeline.ingest(reader, &token).await });

        Self { handle, guard }
    }

    /// Wait for the run. A run that stopped early is reported as
    /// [`AppError::Cancelled`].
    pub(crate) async fn finish(self) -> Result<RunSummary, AppError> {
        let result = self
            .handle
            .await
            .map_err(|e| AppError::Internal(format!("Ingestion task failed: {}", e)))?;
        drop(self.guard);

        let summary = result?;
        if summary.cancelled {
            return Err(AppError::Cancelled(summary));
        }
        Ok(summary)
    }
}
