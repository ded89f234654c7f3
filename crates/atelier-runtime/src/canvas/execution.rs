//! Single-graph executions.

use atelier_core::{ExecutionId, GraphId, NodeId};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::{Canvas, ExecutionEventStream, TRACING_TARGET, lookup_error};
use crate::engine::{ExecutionPlan, RunStatus};
use crate::error::{RuntimeError, RuntimeResult};

impl Canvas {
    /// Starts executing a graph in the background.
    ///
    /// Runs the given output nodes and everything they depend on, or the
    /// whole graph when `output_node_ids` is empty. Up-to-date nodes are
    /// skipped unless `force` is set. Missing graphs, unknown nodes and
    /// graphs that are already running are rejected before anything starts.
    pub async fn start_execution(
        &self,
        graph_id: GraphId,
        output_node_ids: &[NodeId],
        force: bool,
    ) -> RuntimeResult<ExecutionId> {
        let guard = self
            .inner
            .running
            .try_acquire(graph_id)
            .ok_or(RuntimeError::AlreadyRunning(graph_id))?;
        let mut graph = self.load(graph_id).await?;
        let plan = ExecutionPlan::new(&graph, output_node_ids)?;

        let execution_id = ExecutionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(RunStatus::Pending);
        let cancel = CancellationToken::new();
        self.inner
            .executions
            .insert(execution_id, cancel.clone(), status_rx, rx);

        tracing::debug!(
            target: TRACING_TARGET,
            execution_id = %execution_id,
            graph_id = %graph_id,
            nodes = plan.len(),
            force,
            "Execution scheduled"
        );

        let executor = self.inner.graphs.clone();
        tokio::spawn(async move {
            status_tx.send_replace(RunStatus::Running);
            let outcome = executor
                .run(&mut graph, &plan, force, &cancel, |event| {
                    if let Some(event) = event.into_execution_event(execution_id) {
                        let _ = tx.send(event);
                    }
                })
                .await;
            status_tx.send_replace(outcome.status());

            // Release the graph before closing the stream so a subscriber
            // reacting to the terminal event can start it again.
            drop(guard);
            drop(tx);
        });

        Ok(execution_id)
    }

    /// Returns the events of an execution, from its start to its terminal
    /// event.
    ///
    /// Each execution has a single subscriber; events emitted before the
    /// subscription are buffered.
    pub fn subscribe(&self, execution_id: ExecutionId) -> RuntimeResult<ExecutionEventStream> {
        self.inner
            .executions
            .take_events(execution_id)
            .map(UnboundedReceiverStream::new)
            .map_err(|lookup| {
                lookup_error(
                    lookup,
                    RuntimeError::ExecutionNotFound(execution_id),
                    execution_id,
                )
            })
    }

    /// Requests cancellation of an execution.
    ///
    /// The node in flight finishes; no further node starts.
    pub fn cancel_execution(&self, execution_id: ExecutionId) -> RuntimeResult<()> {
        if !self.inner.executions.cancel(execution_id) {
            return Err(RuntimeError::ExecutionNotFound(execution_id));
        }

        tracing::info!(
            target: TRACING_TARGET,
            execution_id = %execution_id,
            "Execution cancellation requested"
        );
        Ok(())
    }

    /// Returns the current status of an execution.
    pub fn execution_status(&self, execution_id: ExecutionId) -> RuntimeResult<RunStatus> {
        self.inner
            .executions
            .status(execution_id)
            .ok_or(RuntimeError::ExecutionNotFound(execution_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use atelier_core::PortId;
    use atelier_core::graph::NodeUpdate;
    use atelier_core::media::MediaType;
    use atelier_core::node::{NodeKind, NodeParams, NodeStatus, Position};
    use atelier_service::{InMemoryGraphRepository, InMemoryMediaStore, MockConfig, MockProvider};
    use futures::StreamExt;

    use super::*;
    use crate::engine::{EngineConfig, ExecutionEvent, ExecutionEventType};

    fn canvas(provider: MockProvider) -> Canvas {
        Canvas::new(
            Arc::new(InMemoryGraphRepository::new()),
            Arc::new(InMemoryMediaStore::new()),
            provider.into_service(),
            EngineConfig::default(),
        )
    }

    fn slow() -> MockProvider {
        MockProvider::new(MockConfig {
            latency_ms: 100,
            ..Default::default()
        })
    }

    async fn add(canvas: &Canvas, graph_id: GraphId, kind: NodeKind, prompt: &str) -> NodeId {
        canvas
            .create_node(
                graph_id,
                kind.to_string(),
                NodeParams::with_prompt(kind, prompt),
                Position::default(),
            )
            .await
            .unwrap()
            .id
    }

    /// Builds `text -> image -> analyze` and returns the graph with its
    /// node ids in creation order.
    async fn storyboard(canvas: &Canvas) -> (GraphId, [NodeId; 3]) {
        let graph_id = canvas.create_graph("storyboard").await.unwrap().id;
        let text = add(canvas, graph_id, NodeKind::GenerateText, "a lighthouse at dusk").await;
        let image = add(canvas, graph_id, NodeKind::GenerateImage, "oil painting").await;
        let analyze = add(canvas, graph_id, NodeKind::AnalyzeImage, "").await;

        for (from, to, port) in [(text, image, "in"), (image, analyze, "image")] {
            canvas
                .create_edge(
                    graph_id,
                    from,
                    &PortId::output(from, "out"),
                    to,
                    &PortId::input(to, port),
                )
                .await
                .unwrap();
        }
        (graph_id, [text, image, analyze])
    }

    fn types(events: &[ExecutionEvent]) -> Vec<(ExecutionEventType, Option<NodeId>)> {
        events.iter().map(|event| (event.event_type, event.node_id)).collect()
    }

    #[tokio::test]
    async fn runs_the_whole_graph_then_nothing() {
        let canvas = canvas(MockProvider::default());
        let (graph_id, [text, image, analyze]) = storyboard(&canvas).await;

        let execution_id = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let events: Vec<_> = canvas.subscribe(execution_id).unwrap().collect().await;

        use ExecutionEventType as T;
        assert_eq!(
            types(&events),
            [
                (T::Started, None),
                (T::NodeStarted, Some(text)),
                (T::NodeCompleted, Some(text)),
                (T::NodeStarted, Some(image)),
                (T::NodeCompleted, Some(image)),
                (T::NodeStarted, Some(analyze)),
                (T::NodeCompleted, Some(analyze)),
                (T::Completed, None),
            ]
        );
        assert!(events.iter().all(|event| event.execution_id == execution_id));
        assert_eq!(events[4].data.as_ref().unwrap()["media_type"], "image");
        assert_eq!(canvas.execution_status(execution_id).unwrap(), RunStatus::Completed);
        assert!(!canvas.is_running(graph_id));

        let graph = canvas.get_graph(graph_id).await.unwrap();
        for node in graph.nodes() {
            assert_eq!(node.status, NodeStatus::Completed);
            assert!(!node.stale);
        }
        let analysis = graph.node(analyze).unwrap().result.as_ref().unwrap();
        assert_eq!(analysis.media_type, MediaType::Text);

        let again = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let events: Vec<_> = canvas.subscribe(again).unwrap().collect().await;
        assert_eq!(
            types(&events),
            [(T::Started, None), (T::Completed, None)]
        );
        assert_eq!(canvas.execution_status(execution_id).unwrap(), RunStatus::Completed);
    }

    #[tokio::test]
    async fn editing_the_middle_reruns_downstream_only() {
        let canvas = canvas(MockProvider::default());
        let (graph_id, [_, image, analyze]) = storyboard(&canvas).await;
        let first = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let _: Vec<_> = canvas.subscribe(first).unwrap().collect().await;

        canvas
            .update_node(
                graph_id,
                image,
                NodeUpdate::default()
                    .with_params(NodeParams::with_prompt(NodeKind::GenerateImage, "watercolor")),
            )
            .await
            .unwrap();

        let second = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let started: Vec<_> = canvas
            .subscribe(second)
            .unwrap()
            .filter_map(|event| async move {
                (event.event_type == ExecutionEventType::NodeStarted)
                    .then_some(event.node_id)
                    .flatten()
            })
            .collect()
            .await;
        assert_eq!(started, [image, analyze]);
    }

    #[tokio::test]
    async fn a_running_graph_rejects_runs_and_edits() {
        let canvas = canvas(slow());
        let (graph_id, [text, ..]) = storyboard(&canvas).await;

        let execution_id = canvas.start_execution(graph_id, &[text], false).await.unwrap();
        assert!(canvas.is_running(graph_id));
        assert!(matches!(
            canvas.start_execution(graph_id, &[], false).await.unwrap_err(),
            RuntimeError::AlreadyRunning(id) if id == graph_id
        ));
        assert!(matches!(
            canvas
                .update_node(graph_id, text, NodeUpdate::default().with_label("x"))
                .await
                .unwrap_err(),
            RuntimeError::AlreadyRunning(_)
        ));

        let events: Vec<_> = canvas.subscribe(execution_id).unwrap().collect().await;
        assert_eq!(events.last().unwrap().event_type, ExecutionEventType::Completed);
        assert!(!canvas.is_running(graph_id));
        canvas
            .update_node(graph_id, text, NodeUpdate::default().with_label("x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_lets_the_current_node_finish() {
        let canvas = canvas(slow());
        let (graph_id, [text, image, analyze]) = storyboard(&canvas).await;

        let execution_id = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let mut stream = canvas.subscribe(execution_id).unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            if event.event_type == ExecutionEventType::NodeStarted {
                canvas.cancel_execution(execution_id).unwrap();
            }
            events.push(event);
        }

        use ExecutionEventType as T;
        assert_eq!(
            types(&events),
            [
                (T::Started, None),
                (T::NodeStarted, Some(text)),
                (T::NodeCompleted, Some(text)),
                (T::Cancelled, None),
            ]
        );
        assert_eq!(canvas.execution_status(execution_id).unwrap(), RunStatus::Cancelled);

        let graph = canvas.get_graph(graph_id).await.unwrap();
        assert_eq!(graph.node(text).unwrap().status, NodeStatus::Completed);
        assert_eq!(graph.node(image).unwrap().status, NodeStatus::Idle);
        assert_eq!(graph.node(analyze).unwrap().status, NodeStatus::Idle);
    }

    #[tokio::test]
    async fn failure_is_reported_with_the_node() {
        let canvas = canvas(MockProvider::failing_on("explode"));
        let graph = canvas.create_graph("broken").await.unwrap();
        let node = canvas
            .create_node(
                graph.id,
                "Script",
                NodeParams::with_prompt(NodeKind::GenerateText, "explode"),
                Position::default(),
            )
            .await
            .unwrap();

        let execution_id = canvas.start_execution(graph.id, &[], false).await.unwrap();
        let events: Vec<_> = canvas.subscribe(execution_id).unwrap().collect().await;
        let last = events.last().unwrap();
        assert_eq!(last.event_type, ExecutionEventType::Failed);
        assert_eq!(last.data.as_ref().unwrap()["node_id"], node.id.to_string());
        assert_eq!(canvas.execution_status(execution_id).unwrap(), RunStatus::Failed);

        let stored = canvas.get_graph(graph.id).await.unwrap();
        let failed = stored.node(node.id).unwrap();
        assert_eq!(failed.status, NodeStatus::Failed);
        assert!(failed.error_message.is_some());
    }

    #[tokio::test]
    async fn unknown_and_taken_executions_are_rejected() {
        let canvas = canvas(MockProvider::default());
        let missing = ExecutionId::new();
        assert!(matches!(
            canvas.subscribe(missing).unwrap_err(),
            RuntimeError::ExecutionNotFound(id) if id == missing
        ));
        assert!(matches!(
            canvas.cancel_execution(missing).unwrap_err(),
            RuntimeError::ExecutionNotFound(_)
        ));
        assert!(canvas.execution_status(missing).is_err());

        let (graph_id, _) = storyboard(&canvas).await;
        let execution_id = canvas.start_execution(graph_id, &[], false).await.unwrap();
        let stream = canvas.subscribe(execution_id).unwrap();
        assert!(matches!(
            canvas.subscribe(execution_id).unwrap_err(),
            RuntimeError::AlreadySubscribed(_)
        ));
        let _: Vec<_> = stream.collect().await;

        assert!(matches!(
            canvas.start_execution(GraphId::new(), &[], false).await.unwrap_err(),
            RuntimeError::GraphNotFound(_)
        ));
        let unknown = NodeId::new();
        assert!(matches!(
            canvas.start_execution(graph_id, &[unknown], false).await.unwrap_err(),
            RuntimeError::Graph(_)
        ));
        assert!(!canvas.is_running(graph_id));
    }
}
