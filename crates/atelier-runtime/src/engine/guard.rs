//! Per-graph single-writer guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use atelier_core::GraphId;

/// Set of graphs currently owned by an execution or an edit.
///
/// Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct RunningGraphs {
    graphs: Arc<Mutex<HashSet<GraphId>>>,
}

impl RunningGraphs {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the graph, or returns `None` when it is already claimed.
    pub fn try_acquire(&self, graph_id: GraphId) -> Option<GraphGuard> {
        let inserted = self
            .graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(graph_id);

        inserted.then(|| GraphGuard {
            graphs: self.clone(),
            graph_id,
        })
    }

    /// Returns whether the graph is currently claimed.
    pub fn contains(&self, graph_id: GraphId) -> bool {
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&graph_id)
    }
}

/// Releases its graph when dropped.
#[derive(Debug)]
pub struct GraphGuard {
    graphs: RunningGraphs,
    graph_id: GraphId,
}

impl GraphGuard {
    /// Returns the claimed graph.
    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }
}

impl Drop for GraphGuard {
    fn drop(&mut self) {
        self.graphs
            .graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.graph_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_release() {
        let running = RunningGraphs::new();
        let graph_id = GraphId::new();

        let guard = running.try_acquire(graph_id).unwrap();
        assert_eq!(guard.graph_id(), graph_id);
        assert!(running.contains(graph_id));
        assert!(running.try_acquire(graph_id).is_none());
        assert!(running.try_acquire(GraphId::new()).is_some());

        drop(guard);
        assert!(!running.contains(graph_id));
        assert!(running.try_acquire(graph_id).is_some());
    }
}
