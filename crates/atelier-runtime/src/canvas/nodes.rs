//! Node and edge editing.

use atelier_core::graph::{Edge, Graph, NodeUpdate};
use atelier_core::node::{Node, NodeParams, Position};
use atelier_core::{EdgeId, GraphId, NodeId, PortId};

use super::{Canvas, TRACING_TARGET};
use crate::error::RuntimeResult;

impl Canvas {
    /// Adds an idle node with the ports of its kind.
    pub async fn create_node(
        &self,
        graph_id: GraphId,
        label: impl Into<String>,
        params: NodeParams,
        position: Position,
    ) -> RuntimeResult<Node> {
        let label = label.into();
        let (_, node) = self
            .edit(graph_id, |graph| {
                Ok(graph.add_node(label, params, position).clone())
            })
            .await?;

        tracing::debug!(
            target: TRACING_TARGET,
            graph_id = %graph_id,
            node_id = %node.id,
            kind = %node.kind(),
            "Node created"
        );
        Ok(node)
    }

    /// Applies a partial update to a node.
    ///
    /// Label and parameter changes mark the node and its descendants stale.
    pub async fn update_node(
        &self,
        graph_id: GraphId,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> RuntimeResult<Node> {
        let (_, node) = self
            .edit(graph_id, |graph| graph.update_node(node_id, update).cloned())
            .await?;
        Ok(node)
    }

    /// Removes a node, its edges and its media.
    ///
    /// Nodes that consumed its output lose an input and become stale.
    pub async fn delete_node(&self, graph_id: GraphId, node_id: NodeId) -> RuntimeResult<Graph> {
        let (graph, _) = self
            .edit(graph_id, |graph| {
                graph.mark_descendants_stale(node_id)?;
                graph.remove_node(node_id)
            })
            .await?;

        if let Err(error) = self.inner.media.delete_node_media(node_id).await {
            tracing::warn!(
                target: TRACING_TARGET,
                graph_id = %graph_id,
                node_id = %node_id,
                error = %error,
                "Failed to delete media of removed node"
            );
        }

        tracing::debug!(
            target: TRACING_TARGET,
            graph_id = %graph_id,
            node_id = %node_id,
            "Node deleted"
        );
        Ok(graph)
    }

    /// Resets a node so the next execution regenerates it.
    ///
    /// With `keep_result` the current result stays visible until it is
    /// replaced. Descendants are marked stale either way.
    pub async fn regenerate_node(
        &self,
        graph_id: GraphId,
        node_id: NodeId,
        keep_result: bool,
    ) -> RuntimeResult<Node> {
        let (_, node) = self
            .edit(graph_id, |graph| {
                graph.regenerate(node_id, keep_result).cloned()
            })
            .await?;
        Ok(node)
    }

    /// Connects an output port to an input port.
    pub async fn create_edge(
        &self,
        graph_id: GraphId,
        from_node_id: NodeId,
        from_port_id: &PortId,
        to_node_id: NodeId,
        to_port_id: &PortId,
    ) -> RuntimeResult<Edge> {
        let (_, edge) = self
            .edit(graph_id, |graph| {
                graph
                    .add_edge(from_node_id, from_port_id, to_node_id, to_port_id)
                    .cloned()
            })
            .await?;

        tracing::debug!(
            target: TRACING_TARGET,
            graph_id = %graph_id,
            edge_id = %edge.id,
            from = %edge.from_port_id,
            to = %edge.to_port_id,
            "Edge created"
        );
        Ok(edge)
    }

    /// Removes an edge; its former target becomes stale.
    pub async fn delete_edge(&self, graph_id: GraphId, edge_id: EdgeId) -> RuntimeResult<Graph> {
        let (graph, _) = self
            .edit(graph_id, |graph| graph.remove_edge(edge_id))
            .await?;
        Ok(graph)
    }
}
