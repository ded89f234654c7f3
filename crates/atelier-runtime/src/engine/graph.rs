//! Graph execution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use atelier_core::graph::Graph;
use atelier_core::media::MediaResult;
use atelier_core::node::NodeStatus;
use atelier_core::{GraphId, GraphResult, NodeId};
use atelier_service::{CanvasMemory, GraphRepository};
use jiff::Timestamp;
use tokio_util::sync::CancellationToken;

use super::{NodeExecutor, RunEvent, RunStatus, TRACING_TARGET};

/// Nodes a run visits, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub graph_id: GraphId,
    /// Requested output nodes.
    pub outputs: Vec<NodeId>,
    /// Outputs and all their ancestors, dependencies first.
    pub order: Vec<NodeId>,
}

impl ExecutionPlan {
    /// Plans a run producing the given outputs.
    ///
    /// An empty selection targets every leaf node, which covers the whole
    /// graph.
    pub fn new(graph: &Graph, output_node_ids: &[NodeId]) -> GraphResult<Self> {
        let outputs = match output_node_ids {
            [] => graph.leaf_nodes(),
            ids => ids.to_vec(),
        };
        let required = graph.required_nodes_for(&outputs)?;
        let order = graph.topological_order(&required)?;

        Ok(Self {
            graph_id: graph.id,
            outputs,
            order,
        })
    }

    /// Returns the number of planned nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether the plan visits no node.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Terminal state of a graph run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed {
        /// Node whose failure halted the run, if any.
        node_id: Option<NodeId>,
        error: String,
    },
    Cancelled,
}

impl RunOutcome {
    /// Returns the run status this outcome corresponds to.
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Completed => RunStatus::Completed,
            Self::Failed { .. } => RunStatus::Failed,
            Self::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// Drives the nodes of one graph in dependency order.
///
/// Nodes run one at a time so every node sees the results of the nodes
/// before it. Up-to-date nodes are skipped unless the run is forced, the
/// first failure halts the run, and cancellation is checked before each
/// node.
#[derive(Clone)]
pub struct GraphExecutor {
    nodes: NodeExecutor,
    repository: Arc<dyn GraphRepository>,
    memory: Arc<dyn CanvasMemory>,
    persist_each_node: bool,
}

impl fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("nodes", &self.nodes)
            .field("persist_each_node", &self.persist_each_node)
            .finish_non_exhaustive()
    }
}

impl GraphExecutor {
    /// Creates a graph executor.
    pub fn new(
        nodes: NodeExecutor,
        repository: Arc<dyn GraphRepository>,
        memory: Arc<dyn CanvasMemory>,
        persist_each_node: bool,
    ) -> Self {
        Self {
            nodes,
            repository,
            memory,
            persist_each_node,
        }
    }

    /// Runs a planned graph to a terminal state.
    ///
    /// Every event is passed to `emit` in order; the last one is always
    /// `Completed`, `Failed` or `Cancelled`. The graph is saved to the
    /// repository when the run ends, and after every node when configured.
    pub async fn run<F>(
        &self,
        graph: &mut Graph,
        plan: &ExecutionPlan,
        force: bool,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> RunOutcome
    where
        F: FnMut(RunEvent) + Send,
    {
        let started_at = Timestamp::now();

        tracing::info!(
            target: TRACING_TARGET,
            graph_id = %graph.id,
            nodes = plan.len(),
            force,
            "Execution started"
        );
        emit(RunEvent::Started);

        let outcome = self.drive(graph, plan, force, cancel, &mut emit).await;
        let outcome = match (outcome, self.persist(graph).await) {
            (RunOutcome::Completed, Err(error)) => RunOutcome::Failed {
                node_id: None,
                error,
            },
            (outcome, Err(error)) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    graph_id = %graph.id,
                    error = %error,
                    "Failed to persist interrupted execution"
                );
                outcome
            }
            (outcome, Ok(())) => outcome,
        };

        let elapsed = Timestamp::now().duration_since(started_at);
        match &outcome {
            RunOutcome::Completed => {
                tracing::info!(
                    target: TRACING_TARGET,
                    graph_id = %graph.id,
                    elapsed_ms = elapsed.as_millis(),
                    "Execution completed"
                );
                emit(RunEvent::Completed);
            }
            RunOutcome::Failed { node_id, error } => {
                tracing::error!(
                    target: TRACING_TARGET,
                    graph_id = %graph.id,
                    node_id = ?node_id,
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Execution failed"
                );
                emit(RunEvent::Failed {
                    node_id: *node_id,
                    error: error.clone(),
                });
            }
            RunOutcome::Cancelled => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    graph_id = %graph.id,
                    elapsed_ms = elapsed.as_millis(),
                    "Execution cancelled"
                );
                emit(RunEvent::Cancelled);
            }
        }

        outcome
    }

    async fn drive<F>(
        &self,
        graph: &mut Graph,
        plan: &ExecutionPlan,
        force: bool,
        cancel: &CancellationToken,
        emit: &mut F,
    ) -> RunOutcome
    where
        F: FnMut(RunEvent) + Send,
    {
        let canvas_memory = match self.memory.resolve(graph).await {
            Ok(memory) => memory,
            Err(error) => {
                return RunOutcome::Failed {
                    node_id: None,
                    error: format!("failed to resolve canvas memory: {error}"),
                };
            }
        };

        let mut queued = Queued::mark(graph, plan, force);
        let mut results: HashMap<NodeId, MediaResult> = HashMap::new();

        for &node_id in &plan.order {
            if cancel.is_cancelled() {
                queued.restore(graph);
                return RunOutcome::Cancelled;
            }

            let Some(node) = graph.node(node_id) else {
                queued.restore(graph);
                return RunOutcome::Failed {
                    node_id: Some(node_id),
                    error: format!("node {node_id} not found"),
                };
            };

            if !force && !node.needs_run() {
                if let Some(result) = &node.result {
                    results.insert(node_id, result.clone());
                }
                tracing::debug!(
                    target: TRACING_TARGET,
                    node_id = %node_id,
                    "Skipping up-to-date node"
                );
                emit(RunEvent::NodeSkipped { node_id });
                continue;
            }

            queued.take(node_id);
            if let Err(error) = graph.set_status(node_id, NodeStatus::Running) {
                queued.restore(graph);
                return RunOutcome::Failed {
                    node_id: Some(node_id),
                    error: error.to_string(),
                };
            }
            emit(RunEvent::NodeStarted { node_id });
            if self.persist_each_node
                && let Err(error) = self.persist(graph).await
            {
                tracing::warn!(
                    target: TRACING_TARGET,
                    node_id = %node_id,
                    error = %error,
                    "Failed to persist running node"
                );
            }

            match self.nodes.execute(graph, node_id, &results, &canvas_memory).await {
                Ok(result) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        node_id = %node_id,
                        media_type = %result.media_type,
                        "Node completed"
                    );
                    emit(RunEvent::NodeCompleted {
                        node_id,
                        media_type: result.media_type,
                        urls: result.urls.clone(),
                    });
                    results.insert(node_id, result);
                }
                Err(error) => {
                    let error = error.to_string();
                    tracing::error!(
                        target: TRACING_TARGET,
                        node_id = %node_id,
                        error = %error,
                        "Node failed"
                    );
                    emit(RunEvent::NodeFailed {
                        node_id,
                        error: error.clone(),
                    });
                    queued.restore(graph);
                    return RunOutcome::Failed {
                        node_id: Some(node_id),
                        error,
                    };
                }
            }

            if self.persist_each_node
                && let Err(error) = self.persist(graph).await
            {
                queued.restore(graph);
                return RunOutcome::Failed {
                    node_id: None,
                    error,
                };
            }
        }

        RunOutcome::Completed
    }

    async fn persist(&self, graph: &Graph) -> Result<(), String> {
        self.repository
            .save(graph)
            .await
            .map_err(|error| format!("failed to save graph: {error}"))
    }
}

/// Nodes marked queued at the start of a run, with their prior status.
struct Queued {
    nodes: HashMap<NodeId, NodeStatus>,
}

impl Queued {
    fn mark(graph: &mut Graph, plan: &ExecutionPlan, force: bool) -> Self {
        let mut nodes = HashMap::new();
        for &node_id in &plan.order {
            let prior = graph
                .node(node_id)
                .filter(|node| force || node.needs_run())
                .map(|node| node.status);
            if let Some(prior) = prior
                && graph.set_status(node_id, NodeStatus::Queued).is_ok()
            {
                nodes.insert(node_id, prior);
            }
        }
        Self { nodes }
    }

    fn take(&mut self, node_id: NodeId) {
        self.nodes.remove(&node_id);
    }

    /// Puts nodes that never started back into their prior status.
    fn restore(&mut self, graph: &mut Graph) {
        for (node_id, status) in self.nodes.drain() {
            let still_queued = graph
                .node(node_id)
                .is_some_and(|node| node.status == NodeStatus::Queued);
            if still_queued && let Err(error) = graph.set_status(node_id, status) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    node_id = %node_id,
                    error = %error,
                    "Failed to restore queued node"
                );
            }
        }
    }
}
