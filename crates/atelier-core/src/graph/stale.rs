//! Staleness tracking.
//!
//! A node is stale when its cached result no longer reflects its inputs.
//! Staleness always flows forward: whatever invalidates a node also
//! invalidates every node reachable from it.

use petgraph::stable_graph::NodeIndex;
use petgraph::visit::Bfs;

use super::Graph;
use crate::TRACING_TARGET;
use crate::error::{GraphError, GraphResult};
use crate::id::NodeId;
use crate::media::MediaResult;
use crate::node::{Node, NodeStatus};

impl Graph {
    /// Marks a node and all of its descendants stale.
    ///
    /// Returns the ids of every node visited, starting with `id`.
    pub fn mark_stale(&mut self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        let index = self.index_of(id)?;
        Ok(self.propagate_from(index, true))
    }

    /// Marks every descendant of a node stale, leaving the node itself as is.
    pub fn mark_descendants_stale(&mut self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        let index = self.index_of(id)?;
        Ok(self.propagate_from(index, false))
    }

    /// Walks forward from `start` and flags every reached node stale.
    ///
    /// Nodes that are already stale are still traversed so descendants
    /// reached only through them are never missed.
    fn propagate_from(&mut self, start: NodeIndex, include_start: bool) -> Vec<NodeId> {
        let mut marked = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(index) = bfs.next(&self.graph) {
            if index == start && !include_start {
                continue;
            }
            let node = &mut self.graph[index];
            node.stale = true;
            marked.push(node.id);
        }

        tracing::trace!(
            target: TRACING_TARGET,
            marked = marked.len(),
            "Propagated staleness"
        );
        marked
    }

    /// Records a successful run of a node.
    ///
    /// Replaces the result, completes the node and clears its own stale flag.
    /// The new result is a changed input for every downstream node, so
    /// children and their descendants become stale.
    pub fn record_success(&mut self, id: NodeId, result: MediaResult) -> GraphResult<&Node> {
        let node = self.node_mut(id)?;
        node.result = Some(result);
        node.status = NodeStatus::Completed;
        node.error_message = None;
        node.stale = false;

        self.mark_descendants_stale(id)?;
        self.node(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Records a failed run of a node.
    ///
    /// The previous result is retained so a failure never destroys content.
    pub fn record_failure(&mut self, id: NodeId, message: impl Into<String>) -> GraphResult<&Node> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Failed;
        node.error_message = Some(message.into());
        Ok(&*node)
    }

    /// Sets the execution status of a node.
    pub fn set_status(&mut self, id: NodeId, status: NodeStatus) -> GraphResult<()> {
        self.node_mut(id)?.status = status;
        Ok(())
    }

    /// Resets a node so the next run regenerates it.
    ///
    /// Clears the error, optionally drops the current result, and marks the
    /// node and its descendants stale.
    pub fn regenerate(&mut self, id: NodeId, keep_result: bool) -> GraphResult<&Node> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Idle;
        node.error_message = None;
        if !keep_result {
            node.result = None;
        }

        self.mark_stale(id)?;
        self.node(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Returns the ids of stale nodes in creation order.
    pub fn stale_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| node.stale)
            .map(|node| node.id)
            .collect()
    }
}
