//! Graph-level operations.

use atelier_core::GraphId;
use atelier_core::graph::Graph;

use super::{Canvas, TRACING_TARGET};
use crate::error::{RuntimeError, RuntimeResult};

/// Changes to a graph's own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphUpdate {
    pub name: Option<String>,
    pub canvas_memory: Option<String>,
}

impl GraphUpdate {
    /// Renames the graph.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the shared prompt context.
    pub fn with_canvas_memory(mut self, canvas_memory: impl Into<String>) -> Self {
        self.canvas_memory = Some(canvas_memory.into());
        self
    }
}

impl Canvas {
    /// Creates an empty graph.
    pub async fn create_graph(&self, name: impl Into<String>) -> RuntimeResult<Graph> {
        let graph = Graph::new(name);
        self.inner.repository.save(&graph).await?;

        tracing::info!(
            target: TRACING_TARGET,
            graph_id = %graph.id,
            name = %graph.name,
            "Graph created"
        );
        Ok(graph)
    }

    /// Stores a graph built elsewhere, replacing any graph with the same id.
    pub async fn import_graph(&self, graph: Graph) -> RuntimeResult<Graph> {
        let _guard = self
            .inner
            .running
            .try_acquire(graph.id)
            .ok_or(RuntimeError::AlreadyRunning(graph.id))?;
        self.inner.repository.save(&graph).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            graph_id = %graph.id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Graph imported"
        );
        Ok(graph)
    }

    /// Lists all graphs, oldest first.
    pub async fn list_graphs(&self) -> RuntimeResult<Vec<Graph>> {
        Ok(self.inner.repository.list().await?)
    }

    /// Returns a graph.
    pub async fn get_graph(&self, graph_id: GraphId) -> RuntimeResult<Graph> {
        self.load(graph_id).await
    }

    /// Renames a graph or replaces its canvas memory.
    ///
    /// Changing the canvas memory does not mark nodes stale.
    pub async fn update_graph(&self, graph_id: GraphId, update: GraphUpdate) -> RuntimeResult<Graph> {
        let (graph, ()) = self
            .edit(graph_id, |graph| {
                if let Some(name) = update.name {
                    graph.name = name;
                }
                if let Some(canvas_memory) = update.canvas_memory {
                    graph.canvas_memory = canvas_memory;
                }
                Ok(())
            })
            .await?;
        Ok(graph)
    }

    /// Deletes a graph together with the media of all its nodes.
    ///
    /// The graph record goes first. Media that cannot be removed afterwards
    /// is logged and left behind rather than failing the call.
    pub async fn delete_graph(&self, graph_id: GraphId) -> RuntimeResult<()> {
        let _guard = self
            .inner
            .running
            .try_acquire(graph_id)
            .ok_or(RuntimeError::AlreadyRunning(graph_id))?;

        let graph = self.load(graph_id).await?;
        if !self.inner.repository.delete(graph_id).await? {
            return Err(RuntimeError::GraphNotFound(graph_id));
        }
        self.delete_media(&graph).await;

        tracing::info!(
            target: TRACING_TARGET,
            graph_id = %graph_id,
            nodes = graph.node_count(),
            "Graph deleted"
        );
        Ok(())
    }

    /// Copies a graph, its results and their media under fresh ids.
    ///
    /// The copy is saved before any media is copied. If copying media fails
    /// the copy is removed again along with whatever media it already got.
    pub async fn duplicate_graph(&self, graph_id: GraphId) -> RuntimeResult<Graph> {
        let source = self.load(graph_id).await?;
        let (copy, mapping) = source.duplicate()?;
        self.inner.repository.save(&copy).await?;

        for (source_node, target_node) in mapping {
            let copied = self
                .inner
                .media
                .duplicate_node_media(source_node, target_node)
                .await;
            if let Err(error) = copied {
                tracing::warn!(
                    target: TRACING_TARGET,
                    source_id = %graph_id,
                    graph_id = %copy.id,
                    error = %error,
                    "Failed to copy media, discarding the copy"
                );
                if let Err(error) = self.inner.repository.delete(copy.id).await {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        graph_id = %copy.id,
                        error = %error,
                        "Failed to discard partial copy"
                    );
                }
                self.delete_media(&copy).await;
                return Err(error.into());
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            source_id = %graph_id,
            graph_id = %copy.id,
            "Graph duplicated"
        );
        Ok(copy)
    }

    /// Removes the media of every node, logging failures.
    async fn delete_media(&self, graph: &Graph) {
        for node_id in graph.node_ids() {
            if let Err(error) = self.inner.media.delete_node_media(node_id).await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    graph_id = %graph.id,
                    node_id = %node_id,
                    error = %error,
                    "Failed to delete node media"
                );
            }
        }
    }
}
