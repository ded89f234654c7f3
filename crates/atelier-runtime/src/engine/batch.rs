//! Batch execution of independent graphs.

use std::fmt;
use std::sync::Arc;

use atelier_core::{BatchId, GraphId};
use atelier_service::GraphRepository;
use jiff::Timestamp;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{
    BatchEventType, BatchExecutionEvent, ExecutionPlan, GraphExecutor, RunOutcome, RunStatus,
    RunningGraphs, TRACING_TARGET,
};
use crate::error::{RuntimeError, RuntimeResult};

/// Graphs of a batch and the number of nodes they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Member graphs in the order they are started.
    pub graph_ids: Vec<GraphId>,
    pub total_nodes: usize,
}

/// Runs several independent graphs as one logical unit.
///
/// Graphs start in input order, at most `max_concurrent_graphs` at a time.
/// A failing graph never stops the batch: the batch only fails when it
/// cannot continue at all, for example when the repository is unreachable.
/// Cancellation prevents further graphs from starting while graphs already
/// running finish on their own.
#[derive(Clone)]
pub struct BatchExecutor {
    graphs: GraphExecutor,
    repository: Arc<dyn GraphRepository>,
    running: RunningGraphs,
    max_concurrent_graphs: usize,
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("graphs", &self.graphs)
            .field("max_concurrent_graphs", &self.max_concurrent_graphs)
            .finish_non_exhaustive()
    }
}

impl BatchExecutor {
    /// Creates a batch executor sharing the given set of running graphs.
    pub fn new(
        graphs: GraphExecutor,
        repository: Arc<dyn GraphRepository>,
        running: RunningGraphs,
        max_concurrent_graphs: usize,
    ) -> Self {
        Self {
            graphs,
            repository,
            running,
            max_concurrent_graphs: max_concurrent_graphs.max(1),
        }
    }

    /// Checks that every graph exists and counts their nodes.
    pub async fn prepare(&self, graph_ids: &[GraphId]) -> RuntimeResult<BatchPlan> {
        let mut total_nodes = 0;
        for &graph_id in graph_ids {
            let graph = self
                .repository
                .load(graph_id)
                .await?
                .ok_or(RuntimeError::GraphNotFound(graph_id))?;
            total_nodes += graph.node_count();
        }

        Ok(BatchPlan {
            graph_ids: graph_ids.to_vec(),
            total_nodes,
        })
    }

    /// Runs every graph of the plan and reports progress on `events`.
    ///
    /// The last event sent is always `batch_completed`, `batch_failed` or
    /// `batch_cancelled`.
    pub async fn run(
        &self,
        batch_id: BatchId,
        plan: BatchPlan,
        force: bool,
        cancel: CancellationToken,
        events: UnboundedSender<BatchExecutionEvent>,
    ) -> RunStatus {
        let started_at = Timestamp::now();

        tracing::info!(
            target: TRACING_TARGET,
            batch_id = %batch_id,
            graphs = plan.graph_ids.len(),
            total_nodes = plan.total_nodes,
            max_concurrent_graphs = self.max_concurrent_graphs,
            "Batch started"
        );
        send(
            &events,
            BatchExecutionEvent::new(batch_id, BatchEventType::BatchStarted).with_data(json!({
                "graph_ids": plan.graph_ids,
                "total_nodes": plan.total_nodes,
            })),
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_graphs));
        let abort = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut failure = None;
        let mut cancelled = false;

        for &graph_id in &plan.graph_ids {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                () = abort.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            if abort.is_cancelled() {
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(permit) = permit else {
                failure = Some("batch scheduler closed".to_owned());
                break;
            };

            let executor = self.clone();
            let events = events.clone();
            let abort = abort.clone();
            tasks.spawn(async move {
                let result = executor.run_member(batch_id, graph_id, force, &events).await;
                if result.is_err() {
                    abort.cancel();
                }
                drop(permit);
                (graph_id, result)
            });
        }

        let mut outcomes = Map::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((graph_id, Ok(status))) => {
                    outcomes.insert(graph_id.to_string(), json!(status));
                }
                Ok((graph_id, Err(error))) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        batch_id = %batch_id,
                        graph_id = %graph_id,
                        error = %error,
                        "Batch member aborted"
                    );
                    failure.get_or_insert_with(|| error.to_string());
                }
                Err(error) => {
                    failure.get_or_insert_with(|| format!("batch member task failed: {error}"));
                }
            }
        }

        let elapsed = Timestamp::now().duration_since(started_at);
        let (status, event) = match failure {
            Some(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    batch_id = %batch_id,
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Batch failed"
                );
                (
                    RunStatus::Failed,
                    BatchExecutionEvent::new(batch_id, BatchEventType::BatchFailed)
                        .with_data(json!({ "error": error })),
                )
            }
            None if cancelled => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    batch_id = %batch_id,
                    finished = outcomes.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "Batch cancelled"
                );
                (
                    RunStatus::Cancelled,
                    BatchExecutionEvent::new(batch_id, BatchEventType::BatchCancelled)
                        .with_data(json!({ "graph_outcomes": Value::Object(outcomes) })),
                )
            }
            None => {
                tracing::info!(
                    target: TRACING_TARGET,
                    batch_id = %batch_id,
                    elapsed_ms = elapsed.as_millis(),
                    "Batch completed"
                );
                (
                    RunStatus::Completed,
                    BatchExecutionEvent::new(batch_id, BatchEventType::BatchCompleted)
                        .with_data(json!({ "graph_outcomes": Value::Object(outcomes) })),
                )
            }
        };
        send(&events, event);
        status
    }

    /// Runs one member graph through its full lifecycle.
    ///
    /// Problems confined to the graph are reported as `graph_failed`; only
    /// collaborator errors abort the batch.
    async fn run_member(
        &self,
        batch_id: BatchId,
        graph_id: GraphId,
        force: bool,
        events: &UnboundedSender<BatchExecutionEvent>,
    ) -> RuntimeResult<RunStatus> {
        let graph_failed = |reason: String| {
            tracing::warn!(
                target: TRACING_TARGET,
                batch_id = %batch_id,
                graph_id = %graph_id,
                reason = %reason,
                "Batch graph failed"
            );
            send(
                events,
                BatchExecutionEvent::new(batch_id, BatchEventType::GraphFailed)
                    .with_graph(graph_id)
                    .with_data(json!({ "reason": reason })),
            );
        };

        let Some(_guard) = self.running.try_acquire(graph_id) else {
            graph_failed(RuntimeError::AlreadyRunning(graph_id).to_string());
            return Ok(RunStatus::Failed);
        };
        let Some(mut graph) = self.repository.load(graph_id).await? else {
            graph_failed(RuntimeError::GraphNotFound(graph_id).to_string());
            return Ok(RunStatus::Failed);
        };
        let plan = match ExecutionPlan::new(&graph, &[]) {
            Ok(plan) => plan,
            Err(error) => {
                graph_failed(error.to_string());
                return Ok(RunStatus::Failed);
            }
        };

        // Batch cancellation never interrupts a graph that already started.
        let outcome = self
            .graphs
            .run(&mut graph, &plan, force, &CancellationToken::new(), |event| {
                if let Some(event) = event.into_batch_event(batch_id, graph_id) {
                    send(events, event);
                }
            })
            .await;

        match &outcome {
            RunOutcome::Completed => send(
                events,
                BatchExecutionEvent::new(batch_id, BatchEventType::GraphCompleted)
                    .with_graph(graph_id),
            ),
            RunOutcome::Failed { error, .. } => graph_failed(error.clone()),
            RunOutcome::Cancelled => graph_failed("cancelled".to_owned()),
        }
        Ok(outcome.status())
    }
}

/// Sends an event, ignoring subscribers that went away.
fn send(events: &UnboundedSender<BatchExecutionEvent>, event: BatchExecutionEvent) {
    let _ = events.send(event);
}
