//! Canvas graph with invariant-enforcing mutations.

use std::collections::HashMap;

use jiff::Timestamp;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use super::GraphDefinition;
use super::edge::Edge;
use crate::error::{GraphError, GraphResult};
use crate::id::{EdgeId, GraphId, NodeId, PortId};
use crate::node::{Node, NodeParams, Position};
use crate::port::PortDirection;

/// Partial update of a node's editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub params: Option<NodeParams>,
    pub position: Option<Position>,
}

impl NodeUpdate {
    /// Sets the new label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the new parameters.
    pub fn with_params(mut self, params: NodeParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Sets the new position.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

/// A canvas graph of generation nodes connected through typed ports.
///
/// Internally uses petgraph's `StableDiGraph` so indices survive removals.
/// Every mutation either succeeds and keeps the invariants, or fails and
/// leaves the graph untouched:
///
/// - edges reference existing nodes and ports of the right direction,
/// - edge endpoint types unify,
/// - every input port has at most one inbound edge,
/// - the graph is acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphDefinition", try_from = "GraphDefinition")]
pub struct Graph {
    pub id: GraphId,
    pub name: String,
    /// Shared context prepended to every node's effective prompt.
    pub canvas_memory: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub(super) graph: StableDiGraph<Node, Edge>,
    pub(super) node_indices: HashMap<NodeId, NodeIndex>,
    pub(super) edge_indices: HashMap<EdgeId, EdgeIndex>,
    /// Node ids in creation order, used for deterministic tie-breaking.
    pub(super) insertion_order: Vec<NodeId>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(GraphId::new(), name)
    }

    /// Creates a new empty graph with a specific ID.
    pub fn with_id(id: GraphId, name: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            name: name.into(),
            canvas_memory: String::new(),
            created_at: now,
            updated_at: now,
            graph: StableDiGraph::default(),
            node_indices: HashMap::new(),
            edge_indices: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Stamps the modification time.
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    /// Returns whether a node exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    /// Returns a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let index = self.node_indices.get(&id)?;
        self.graph.node_weight(*index)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        let index = self.index_of(id)?;
        self.graph
            .node_weight_mut(index)
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn index_of(&self, id: NodeId) -> GraphResult<NodeIndex> {
        self.node_indices
            .get(&id)
            .copied()
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Returns all nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.insertion_order.iter().filter_map(|id| self.node(*id))
    }

    /// Returns all node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.insertion_order.iter().copied()
    }

    /// Returns a reference to an edge.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        let index = self.edge_indices.get(&id)?;
        self.graph.edge_weight(*index)
    }

    /// Returns an iterator over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.graph
            .edge_indices()
            .filter_map(|index| self.graph.edge_weight(index))
    }

    /// Returns edges targeting a node.
    pub fn incoming_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.directed_edges(id, Direction::Incoming)
    }

    /// Returns edges originating from a node.
    pub fn outgoing_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.directed_edges(id, Direction::Outgoing)
    }

    fn directed_edges(&self, id: NodeId, direction: Direction) -> impl Iterator<Item = &Edge> + '_ {
        self.node_indices
            .get(&id)
            .into_iter()
            .flat_map(move |index| self.graph.edges_directed(*index, direction))
            .map(|edge| edge.weight())
    }

    /// Returns the edge bound to an input port, if any.
    pub fn inbound_edge(&self, node_id: NodeId, port_id: &PortId) -> Option<&Edge> {
        self.incoming_edges(node_id)
            .find(|edge| &edge.to_port_id == port_id)
    }

    /// Adds an idle node whose ports are instantiated from its kind's template.
    pub fn add_node(
        &mut self,
        label: impl Into<String>,
        params: NodeParams,
        position: Position,
    ) -> &Node {
        let id = NodeId::new();
        let index = self.graph.add_node(Node::new(id, label, params, position));
        self.node_indices.insert(id, index);
        self.insertion_order.push(id);
        &self.graph[index]
    }

    /// Inserts an existing node, preserving its id and state.
    ///
    /// Fails if the id is taken, or if the node's ports or parameters do not
    /// match its kind.
    pub fn insert_node(&mut self, node: Node) -> GraphResult<&Node> {
        if self.node_indices.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if node.params().kind() != node.kind() {
            return Err(GraphError::ParamsKindMismatch {
                node_id: node.id,
                expected: node.kind(),
                actual: node.params().kind(),
            });
        }
        if !node.has_template_ports() {
            return Err(GraphError::InvalidDefinition(format!(
                "ports of node {} do not match the {} template",
                node.id,
                node.kind()
            )));
        }

        let id = node.id;
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        self.insertion_order.push(id);
        Ok(&self.graph[index])
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let index = self.index_of(id)?;
        let touching: Vec<EdgeId> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .chain(self.graph.edges_directed(index, Direction::Outgoing))
            .map(|edge| edge.weight().id)
            .collect();
        for edge_id in touching {
            self.edge_indices.remove(&edge_id);
        }

        self.node_indices.remove(&id);
        self.insertion_order.retain(|node_id| *node_id != id);
        self.graph
            .remove_node(index)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Applies a partial update to a node.
    ///
    /// A changed label or changed parameters mark the node and its
    /// descendants stale. Moving a node does not.
    pub fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> GraphResult<&Node> {
        let node = self.node(id).ok_or(GraphError::NodeNotFound(id))?;
        if let Some(params) = &update.params
            && params.kind() != node.kind()
        {
            return Err(GraphError::ParamsKindMismatch {
                node_id: id,
                expected: node.kind(),
                actual: params.kind(),
            });
        }

        let node = self.node_mut(id)?;
        let mut changed = false;
        if let Some(label) = update.label
            && label != node.label
        {
            node.label = label;
            changed = true;
        }
        if let Some(params) = update.params
            && params != node.params
        {
            node.params = params;
            changed = true;
        }
        if let Some(position) = update.position {
            node.position = position;
        }

        if changed {
            self.mark_stale(id)?;
        }
        self.node(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Connects an output port to an input port.
    ///
    /// On success the target node and its descendants are marked stale.
    pub fn add_edge(
        &mut self,
        from_node_id: NodeId,
        from_port_id: &PortId,
        to_node_id: NodeId,
        to_port_id: &PortId,
    ) -> GraphResult<&Edge> {
        let edge = Edge::new(
            from_node_id,
            from_port_id.clone(),
            to_node_id,
            to_port_id.clone(),
        );
        let index = self.insert_edge(edge)?;
        self.mark_stale(to_node_id)?;
        Ok(&self.graph[index])
    }

    /// Validates and inserts an edge without touching staleness.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> GraphResult<EdgeIndex> {
        let from_index = self.index_of(edge.from_node_id)?;
        let to_index = self.index_of(edge.to_node_id)?;

        let producer = self.graph[from_index]
            .port(&edge.from_port_id)
            .filter(|port| port.direction == PortDirection::Output)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: edge.from_node_id,
                port: edge.from_port_id.clone(),
            })?;
        let consumer = self.graph[to_index]
            .port(&edge.to_port_id)
            .filter(|port| port.direction == PortDirection::Input)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: edge.to_node_id,
                port: edge.to_port_id.clone(),
            })?;

        if !producer.can_connect_to(consumer) {
            return Err(GraphError::IncompatiblePortType {
                from: producer.port_type,
                to: consumer.port_type,
            });
        }
        if self.inbound_edge(edge.to_node_id, &edge.to_port_id).is_some() {
            return Err(GraphError::PortAlreadyConnected {
                node_id: edge.to_node_id,
                port: edge.to_port_id,
            });
        }
        if self.edge_indices.contains_key(&edge.id) {
            return Err(GraphError::InvalidDefinition(format!(
                "edge {} already exists",
                edge.id
            )));
        }
        // The new edge closes a cycle iff its target already reaches its source.
        if has_path_connecting(&self.graph, to_index, from_index, None) {
            return Err(GraphError::CycleDetected {
                nodes: vec![edge.from_node_id, edge.to_node_id],
            });
        }

        let id = edge.id;
        let index = self.graph.add_edge(from_index, to_index, edge);
        self.edge_indices.insert(id, index);
        Ok(index)
    }

    /// Removes an edge.
    ///
    /// The former target and its descendants are marked stale, even though
    /// re-adding an identical edge would restore the same inputs.
    pub fn remove_edge(&mut self, id: EdgeId) -> GraphResult<Edge> {
        let index = self
            .edge_indices
            .get(&id)
            .copied()
            .ok_or(GraphError::EdgeNotFound(id))?;
        let edge = self
            .graph
            .remove_edge(index)
            .ok_or(GraphError::EdgeNotFound(id))?;
        self.edge_indices.remove(&id);
        self.mark_stale(edge.to_node_id)?;
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeStatus};
    use crate::port::PortType;

    fn add(graph: &mut Graph, kind: NodeKind) -> NodeId {
        graph
            .add_node(kind.to_string(), NodeParams::default_for(kind), Position::default())
            .id
    }

    fn connect(graph: &mut Graph, from: NodeId, to: NodeId) -> GraphResult<EdgeId> {
        let from_port = graph.node(from).unwrap().output_ports()[0].id.clone();
        let to_port = graph.node(to).unwrap().input_ports()[0].id.clone();
        graph
            .add_edge(from, &from_port, to, &to_port)
            .map(|edge| edge.id)
    }

    #[test]
    fn add_node_instantiates_idle_node() {
        let mut graph = Graph::new("test");
        let id = add(&mut graph, NodeKind::GenerateImage);

        let node = graph.node(id).unwrap();
        assert_eq!(node.status, NodeStatus::Idle);
        assert!(!node.stale);
        assert_eq!(node.output_ports()[0].port_type, PortType::Image);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn text_output_cannot_feed_image_input() {
        let mut graph = Graph::new("test");
        let text = add(&mut graph, NodeKind::GenerateText);
        let analyze = add(&mut graph, NodeKind::AnalyzeImage);

        let err = connect(&mut graph, text, analyze).unwrap_err();
        assert_eq!(
            err,
            GraphError::IncompatiblePortType {
                from: PortType::Text,
                to: PortType::Image,
            }
        );
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn any_port_accepts_every_producer() {
        let mut graph = Graph::new("test");
        let speech = add(&mut graph, NodeKind::GenerateSpeech);
        let video = add(&mut graph, NodeKind::GenerateVideo);
        let text = add(&mut graph, NodeKind::GenerateText);

        assert!(connect(&mut graph, speech, video).is_ok());
        assert!(connect(&mut graph, video, text).is_ok());
    }

    #[test]
    fn input_port_accepts_a_single_edge() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let b = add(&mut graph, NodeKind::GenerateText);
        let x = add(&mut graph, NodeKind::GenerateImage);

        connect(&mut graph, a, x).unwrap();
        let err = connect(&mut graph, b, x).unwrap_err();
        assert!(matches!(err, GraphError::PortAlreadyConnected { node_id, .. } if node_id == x));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn output_port_fans_out() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let b = add(&mut graph, NodeKind::GenerateImage);
        let c = add(&mut graph, NodeKind::GenerateVideo);

        connect(&mut graph, a, b).unwrap();
        connect(&mut graph, a, c).unwrap();
        assert_eq!(graph.outgoing_edges(a).count(), 2);
    }

    #[test]
    fn closing_a_cycle_is_rejected() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let b = add(&mut graph, NodeKind::GenerateText);
        let c = add(&mut graph, NodeKind::GenerateText);

        connect(&mut graph, a, b).unwrap();
        connect(&mut graph, b, c).unwrap();
        let before: Vec<_> = graph.edges().cloned().collect();

        let err = connect(&mut graph, c, a).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        let after: Vec<_> = graph.edges().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        assert!(matches!(
            connect(&mut graph, a, a),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn unknown_ports_are_rejected() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let b = add(&mut graph, NodeKind::GenerateImage);

        // Input used as the producer side.
        let wrong = PortId::input(a, "in");
        let target = PortId::input(b, "in");
        let err = graph.add_edge(a, &wrong, b, &target).unwrap_err();
        assert!(matches!(err, GraphError::PortNotFound { node_id, .. } if node_id == a));

        let missing = NodeId::new();
        let err = graph
            .add_edge(missing, &PortId::output(missing, "out"), b, &target)
            .unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound(missing));
    }

    #[test]
    fn remove_node_cascades_to_edges() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let b = add(&mut graph, NodeKind::GenerateImage);
        let c = add(&mut graph, NodeKind::AnalyzeImage);
        connect(&mut graph, a, b).unwrap();
        let kept = connect(&mut graph, b, c).unwrap();

        graph.remove_node(a).unwrap();
        assert!(!graph.contains_node(a));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edges().all(|edge| !edge.touches(a)));
        assert!(graph.edge(kept).is_some());
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), [b, c]);
    }

    #[test]
    fn update_rejects_params_of_another_kind() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, NodeKind::GenerateText);
        let update = NodeUpdate::default()
            .with_params(NodeParams::default_for(NodeKind::GenerateVideo));

        assert!(matches!(
            graph.update_node(a, update),
            Err(GraphError::ParamsKindMismatch { .. })
        ));
    }

    #[test]
    fn remove_missing_edge_fails() {
        let mut graph = Graph::new("test");
        let id = EdgeId::new();
        assert_eq!(graph.remove_edge(id).unwrap_err(), GraphError::EdgeNotFound(id));
    }
}
