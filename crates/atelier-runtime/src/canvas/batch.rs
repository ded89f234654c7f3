//! Batch executions across graphs.

use atelier_core::{BatchId, GraphId};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::{BatchEventStream, Canvas, TRACING_TARGET, lookup_error};
use crate::engine::RunStatus;
use crate::error::{RuntimeError, RuntimeResult};

impl Canvas {
    /// Starts running several graphs as one batch.
    ///
    /// Every graph must exist. Graphs start in the given order, at most
    /// `max_concurrent_graphs` at a time, and a failing graph does not stop
    /// the others.
    pub async fn start_batch(&self, graph_ids: &[GraphId], force: bool) -> RuntimeResult<BatchId> {
        let plan = self.inner.batches.prepare(graph_ids).await?;

        let batch_id = BatchId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(RunStatus::Pending);
        let cancel = CancellationToken::new();
        self.inner
            .batch_runs
            .insert(batch_id, cancel.clone(), status_rx, rx);

        tracing::debug!(
            target: TRACING_TARGET,
            batch_id = %batch_id,
            graphs = plan.graph_ids.len(),
            force,
            "Batch scheduled"
        );

        let executor = self.inner.batches.clone();
        tokio::spawn(async move {
            status_tx.send_replace(RunStatus::Running);
            let status = executor
                .run(batch_id, plan, force, cancel, tx.clone())
                .await;
            status_tx.send_replace(status);

            // The stream ends only once the final status is observable.
            drop(tx);
        });

        Ok(batch_id)
    }

    /// Returns the events of a batch, from `batch_started` to its terminal
    /// event.
    pub fn subscribe_batch(&self, batch_id: BatchId) -> RuntimeResult<BatchEventStream> {
        self.inner
            .batch_runs
            .take_events(batch_id)
            .map(UnboundedReceiverStream::new)
            .map_err(|lookup| lookup_error(lookup, RuntimeError::BatchNotFound(batch_id), batch_id))
    }

    /// Stops a batch from starting further graphs.
    ///
    /// Graphs already running finish normally.
    pub fn cancel_batch(&self, batch_id: BatchId) -> RuntimeResult<()> {
        if !self.inner.batch_runs.cancel(batch_id) {
            return Err(RuntimeError::BatchNotFound(batch_id));
        }

        tracing::info!(
            target: TRACING_TARGET,
            batch_id = %batch_id,
            "Batch cancellation requested"
        );
        Ok(())
    }

    /// Returns the current status of a batch.
    pub fn batch_status(&self, batch_id: BatchId) -> RuntimeResult<RunStatus> {
        self.inner
            .batch_runs
            .status(batch_id)
            .ok_or(RuntimeError::BatchNotFound(batch_id))
    }
}
