//! Application-facing canvas facade.
//!
//! [`Canvas`] bundles graph editing and execution control behind one
//! cloneable handle. Collaborators are injected at construction so tests
//! can run against in-memory fakes. Every edit returns the resulting
//! authoritative state.
//!
//! A graph has a single writer at a time: while an execution owns a graph,
//! edits and further executions of it are rejected with
//! [`RuntimeError::AlreadyRunning`].

mod batch;
mod execution;
mod graphs;
mod nodes;
mod registry;

use std::fmt;
use std::sync::Arc;

use atelier_core::graph::Graph;
use atelier_core::{BatchId, ExecutionId, GraphId, GraphResult};
use atelier_service::generation::GenerationService;
use atelier_service::{
    CanvasMemory, GraphRepository, MediaStore, NoopEnricher, PromptEnricher, StaticCanvasMemory,
};
pub use graphs::GraphUpdate;
use registry::{Lookup, RunRegistry};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::engine::{
    BatchExecutionEvent, BatchExecutor, EngineConfig, ExecutionEvent, GraphExecutor, NodeExecutor,
    RunningGraphs,
};
use crate::error::{RuntimeError, RuntimeResult};

/// Tracing target for canvas operations.
pub const TRACING_TARGET: &str = "atelier_runtime::canvas";

/// Ordered events of one execution, ending with its terminal event.
pub type ExecutionEventStream = UnboundedReceiverStream<ExecutionEvent>;

/// Ordered events of one batch, ending with its terminal event.
pub type BatchEventStream = UnboundedReceiverStream<BatchExecutionEvent>;

/// Graph editing and execution control over injected collaborators.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct Canvas {
    inner: Arc<CanvasInner>,
}

struct CanvasInner {
    repository: Arc<dyn GraphRepository>,
    media: Arc<dyn MediaStore>,
    config: EngineConfig,
    running: RunningGraphs,
    graphs: GraphExecutor,
    batches: BatchExecutor,
    executions: RunRegistry<ExecutionId, ExecutionEvent>,
    batch_runs: RunRegistry<BatchId, BatchExecutionEvent>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Creates a canvas that uses each graph's own canvas memory.
    pub fn new(
        repository: Arc<dyn GraphRepository>,
        media: Arc<dyn MediaStore>,
        generation: GenerationService,
        config: EngineConfig,
    ) -> Self {
        Self::with_canvas_memory(
            repository,
            media,
            generation,
            Arc::new(StaticCanvasMemory),
            config,
        )
    }

    /// Creates a canvas with a custom canvas memory resolver.
    pub fn with_canvas_memory(
        repository: Arc<dyn GraphRepository>,
        media: Arc<dyn MediaStore>,
        generation: GenerationService,
        memory: Arc<dyn CanvasMemory>,
        config: EngineConfig,
    ) -> Self {
        Self::with_context(
            repository,
            media,
            generation,
            memory,
            Arc::new(NoopEnricher),
            config,
        )
    }

    /// Creates a canvas with custom canvas memory and prompt enrichment.
    ///
    /// The enricher only sees prompts of nodes whose parameters set
    /// `enrich` or `human_edited` to `true`.
    pub fn with_context(
        repository: Arc<dyn GraphRepository>,
        media: Arc<dyn MediaStore>,
        generation: GenerationService,
        memory: Arc<dyn CanvasMemory>,
        enricher: Arc<dyn PromptEnricher>,
        config: EngineConfig,
    ) -> Self {
        let running = RunningGraphs::new();
        let nodes = NodeExecutor::new(generation, media.clone(), config.generation_timeout)
            .with_kind_concurrency(&config.kind_concurrency)
            .with_enricher(enricher);
        let graphs = GraphExecutor::new(
            nodes,
            repository.clone(),
            memory,
            config.persist_each_node,
        );
        let batches = BatchExecutor::new(
            graphs.clone(),
            repository.clone(),
            running.clone(),
            config.max_concurrent_graphs,
        );

        tracing::info!(
            target: TRACING_TARGET,
            max_concurrent_graphs = config.max_concurrent_graphs,
            generation_timeout_secs = config.generation_timeout.as_secs(),
            persist_each_node = config.persist_each_node,
            "Canvas initialized"
        );

        let retention = config.run_retention;
        Self {
            inner: Arc::new(CanvasInner {
                repository,
                media,
                config,
                running,
                graphs,
                batches,
                executions: RunRegistry::new(retention),
                batch_runs: RunRegistry::new(retention),
            }),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns whether an execution currently owns the graph.
    pub fn is_running(&self, graph_id: GraphId) -> bool {
        self.inner.running.contains(graph_id)
    }

    async fn load(&self, graph_id: GraphId) -> RuntimeResult<Graph> {
        self.inner
            .repository
            .load(graph_id)
            .await?
            .ok_or(RuntimeError::GraphNotFound(graph_id))
    }

    /// Applies an edit to a stored graph and saves the result.
    ///
    /// The graph is claimed for the duration of the edit. A failed edit
    /// leaves the stored graph untouched.
    async fn edit<T>(
        &self,
        graph_id: GraphId,
        apply: impl FnOnce(&mut Graph) -> GraphResult<T>,
    ) -> RuntimeResult<(Graph, T)> {
        let _guard = self
            .inner
            .running
            .try_acquire(graph_id)
            .ok_or(RuntimeError::AlreadyRunning(graph_id))?;

        let mut graph = self.load(graph_id).await?;
        let value = apply(&mut graph)?;
        graph.touch();
        self.inner.repository.save(&graph).await?;
        Ok((graph, value))
    }
}

fn lookup_error(lookup: Lookup, missing: RuntimeError, id: impl fmt::Display) -> RuntimeError {
    match lookup {
        Lookup::Missing => missing,
        Lookup::Taken => RuntimeError::AlreadySubscribed(id.to_string()),
    }
}
