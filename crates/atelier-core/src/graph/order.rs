//! Execution planning: required subsets and deterministic ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::visit::{Dfs, EdgeRef, Reversed};

use super::Graph;
use crate::error::{GraphError, GraphResult};
use crate::id::NodeId;

impl Graph {
    /// Returns the given output nodes plus every ancestor they depend on.
    pub fn required_nodes_for(&self, output_ids: &[NodeId]) -> GraphResult<HashSet<NodeId>> {
        let mut required = HashSet::new();
        let reversed = Reversed(&self.graph);
        for id in output_ids {
            let start = self.index_of(*id)?;
            let mut dfs = Dfs::new(reversed, start);
            while let Some(index) = dfs.next(reversed) {
                required.insert(self.graph[index].id);
            }
        }
        Ok(required)
    }

    /// Orders the induced subgraph on `required` so every node comes after
    /// the nodes it depends on.
    ///
    /// When several nodes are ready at once, the one created first wins, so
    /// the same graph and selection always yield the same order.
    pub fn topological_order(&self, required: &HashSet<NodeId>) -> GraphResult<Vec<NodeId>> {
        let rank: HashMap<NodeId, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(rank, id)| (*id, rank))
            .collect();

        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(required.len());
        for id in required {
            let index = self.index_of(*id)?;
            let degree = self
                .graph
                .edges_directed(index, Direction::Incoming)
                .filter(|edge| required.contains(&self.graph[edge.source()].id))
                .count();
            in_degree.insert(*id, degree);
        }

        let mut ready: BinaryHeap<Reverse<(usize, NodeId)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| Reverse((rank[id], *id)))
            .collect();

        let mut order = Vec::with_capacity(required.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            let index = self.index_of(id)?;
            for edge in self.graph.edges_directed(index, Direction::Outgoing) {
                let target = self.graph[edge.target()].id;
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((rank[&target], target)));
                    }
                }
            }
        }

        if order.len() < required.len() {
            let mut nodes: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            nodes.sort_by_key(|id| rank[id]);
            return Err(GraphError::CycleDetected { nodes });
        }

        Ok(order)
    }

    /// Returns nodes without outgoing edges, in creation order.
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.insertion_order
            .iter()
            .copied()
            .filter(|id| self.outgoing_edges(*id).next().is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::error::GraphError;
    use crate::graph::{Edge, Graph};
    use crate::id::NodeId;
    use crate::node::{NodeKind, NodeParams, Position};

    fn add(graph: &mut Graph, label: &str) -> NodeId {
        graph
            .add_node(label, NodeParams::default_for(NodeKind::GenerateText), Position::default())
            .id
    }

    fn connect(graph: &mut Graph, from: NodeId, to: NodeId) {
        let from_port = graph.node(from).unwrap().output_ports()[0].id.clone();
        let to_port = graph.node(to).unwrap().input_ports()[0].id.clone();
        graph.add_edge(from, &from_port, to, &to_port).unwrap();
    }

    fn all(graph: &Graph) -> HashSet<NodeId> {
        graph.node_ids().collect()
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = Graph::new("test");
        let c = add(&mut graph, "c");
        let b = add(&mut graph, "b");
        let a = add(&mut graph, "a");
        connect(&mut graph, a, b);
        connect(&mut graph, b, c);

        assert_eq!(graph.topological_order(&all(&graph)).unwrap(), [a, b, c]);
    }

    #[test]
    fn ties_break_by_creation_order() {
        let mut graph = Graph::new("test");
        let x = add(&mut graph, "x");
        let y = add(&mut graph, "y");
        let z = add(&mut graph, "z");
        let sink = add(&mut graph, "sink");
        connect(&mut graph, z, sink);

        let order = graph.topological_order(&all(&graph)).unwrap();
        assert_eq!(order, [x, y, z, sink]);
        for _ in 0..10 {
            assert_eq!(graph.topological_order(&all(&graph)).unwrap(), order);
        }
    }

    #[test]
    fn order_is_restricted_to_the_selection() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let c = add(&mut graph, "c");
        connect(&mut graph, a, b);
        connect(&mut graph, b, c);

        let selection: HashSet<_> = [b, c].into_iter().collect();
        assert_eq!(graph.topological_order(&selection).unwrap(), [b, c]);
    }

    #[test]
    fn required_nodes_walk_upstream_only() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let c = add(&mut graph, "c");
        let unrelated = add(&mut graph, "unrelated");
        connect(&mut graph, a, b);
        connect(&mut graph, b, c);

        let required = graph.required_nodes_for(&[b]).unwrap();
        assert_eq!(required, [a, b].into_iter().collect());
        assert!(!required.contains(&unrelated));

        let missing = NodeId::new();
        assert_eq!(
            graph.required_nodes_for(&[missing]).unwrap_err(),
            GraphError::NodeNotFound(missing)
        );
    }

    #[test]
    fn leaf_nodes_have_no_outgoing_edges() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let c = add(&mut graph, "c");
        connect(&mut graph, a, b);

        assert_eq!(graph.leaf_nodes(), [b, c]);
    }

    #[test]
    fn corrupted_cycle_is_reported() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        connect(&mut graph, a, b);

        // Bypass validation to simulate a graph that violates its invariants.
        let (from, to) = (graph.node_indices[&b], graph.node_indices[&a]);
        let edge = Edge::new(
            b,
            graph.node(b).unwrap().output_ports()[0].id.clone(),
            a,
            graph.node(a).unwrap().input_ports()[0].id.clone(),
        );
        graph.graph.add_edge(from, to, edge);

        let err = graph.topological_order(&all(&graph)).unwrap_err();
        assert_eq!(err, GraphError::CycleDetected { nodes: vec![a, b] });
    }
}
