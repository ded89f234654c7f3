//! Serializable graph definition.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{Edge, Graph};
use crate::error::{GraphError, GraphResult};
use crate::id::{GraphId, NodeId, PortId};
use crate::node::Node;

/// Serializable form of a [`Graph`].
///
/// Nodes are listed in creation order. Converting back into a [`Graph`]
/// re-validates every invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(default)]
    pub id: GraphId,
    pub name: String,
    #[serde(default)]
    pub canvas_memory: String,
    #[serde(default = "Timestamp::now")]
    pub created_at: Timestamp,
    #[serde(default = "Timestamp::now")]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Converts the graph into its serializable form.
    pub fn to_definition(&self) -> GraphDefinition {
        GraphDefinition {
            id: self.id,
            name: self.name.clone(),
            canvas_memory: self.canvas_memory.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    /// Builds a graph from its serializable form, validating all invariants.
    pub fn from_definition(definition: GraphDefinition) -> GraphResult<Self> {
        let mut graph = Graph::with_id(definition.id, definition.name);
        graph.canvas_memory = definition.canvas_memory;
        graph.created_at = definition.created_at;
        graph.updated_at = definition.updated_at;

        for node in definition.nodes {
            graph.insert_node(node)?;
        }
        for edge in definition.edges {
            graph.insert_edge(edge)?;
        }
        Ok(graph)
    }

    /// Deep-copies the graph under fresh graph, node and edge ids.
    ///
    /// Node state, results and staleness are carried over. Returns the copy
    /// along with the mapping from original to copied node ids, so callers
    /// can duplicate the media the results point at.
    pub fn duplicate(&self) -> GraphResult<(Graph, Vec<(NodeId, NodeId)>)> {
        let mut copy = Graph::new(format!("{} (Copy)", self.name));
        copy.canvas_memory = self.canvas_memory.clone();

        let mut mapping = Vec::with_capacity(self.node_count());
        let mut new_ids = HashMap::with_capacity(self.node_count());
        for node in self.nodes() {
            let new_id = NodeId::new();
            copy.insert_node(node.reassign(new_id))?;
            mapping.push((node.id, new_id));
            new_ids.insert(node.id, new_id);
        }

        let remap = |node_id: NodeId, port_id: &PortId| -> GraphResult<(NodeId, PortId)> {
            let port = self
                .node(node_id)
                .and_then(|node| node.port(port_id))
                .ok_or_else(|| GraphError::PortNotFound {
                    node_id,
                    port: port_id.clone(),
                })?;
            let new_id = *new_ids
                .get(&node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            Ok((new_id, PortId::new(new_id, port.direction, &port.name)))
        };

        for edge in self.edges() {
            let (from_node_id, from_port_id) = remap(edge.from_node_id, &edge.from_port_id)?;
            let (to_node_id, to_port_id) = remap(edge.to_node_id, &edge.to_port_id)?;
            copy.insert_edge(Edge::new(from_node_id, from_port_id, to_node_id, to_port_id))?;
        }

        Ok((copy, mapping))
    }
}

impl From<Graph> for GraphDefinition {
    fn from(graph: Graph) -> Self {
        graph.to_definition()
    }
}

impl TryFrom<GraphDefinition> for Graph {
    type Error = GraphError;

    fn try_from(definition: GraphDefinition) -> Result<Self, Self::Error> {
        Graph::from_definition(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaMetadata, MediaResult, MediaType, MediaUrls};
    use crate::node::{NodeKind, NodeParams, Position};

    fn sample() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("hooks");
        graph.canvas_memory = "brand voice: playful".into();
        let text = graph
            .add_node(
                "Script",
                NodeParams::with_prompt(NodeKind::GenerateText, "write a hook"),
                Position::new(0.0, 0.0),
            )
            .id;
        let image = graph
            .add_node(
                "Frame",
                NodeParams::default_for(NodeKind::GenerateImage),
                Position::new(200.0, 0.0),
            )
            .id;
        let from = PortId::output(text, "out");
        let to = PortId::input(image, "in");
        graph.add_edge(text, &from, image, &to).unwrap();
        (graph, text, image)
    }

    #[test]
    fn json_roundtrip_preserves_structure_and_order() {
        let (graph, text, image) = sample();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: Graph = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, graph.id);
        assert_eq!(restored.canvas_memory, graph.canvas_memory);
        assert_eq!(restored.node_ids().collect::<Vec<_>>(), [text, image]);
        assert_eq!(restored.to_definition(), graph.to_definition());
    }

    #[test]
    fn definitions_with_broken_invariants_are_rejected() {
        let (graph, _, image) = sample();
        let mut definition = graph.to_definition();
        let mut duplicate = definition.edges[0].clone();
        duplicate.id = crate::id::EdgeId::new();
        definition.edges.push(duplicate);

        let err = Graph::from_definition(definition).unwrap_err();
        assert!(matches!(err, GraphError::PortAlreadyConnected { node_id, .. } if node_id == image));

        let json = serde_json::json!({
            "name": "bad",
            "nodes": [{
                "id": NodeId::new(),
                "type": "generate_text",
                "label": "x",
                "params": { "type": "generate_image" },
                "input_ports": [],
                "output_ports": []
            }]
        });
        assert!(serde_json::from_value::<Graph>(json).is_err());
    }

    #[test]
    fn duplicate_remaps_ids_ports_and_media() {
        let (mut graph, text, image) = sample();
        let result = MediaResult::new(
            MediaType::Text,
            MediaUrls::same(format!("/media/{text}/gen/original.txt")),
            "write a hook",
            MediaMetadata::default(),
            graph.node(text).unwrap().params().clone(),
        );
        graph.record_success(text, result).unwrap();

        let (copy, mapping) = graph.duplicate().unwrap();
        assert_ne!(copy.id, graph.id);
        assert_eq!(copy.name, "hooks (Copy)");
        assert_eq!(copy.canvas_memory, graph.canvas_memory);
        assert_eq!(mapping.len(), 2);

        let (_, new_text) = mapping.iter().find(|(old, _)| *old == text).unwrap();
        let (_, new_image) = mapping.iter().find(|(old, _)| *old == image).unwrap();
        let copied = copy.node(*new_text).unwrap();
        assert_eq!(
            copied.result.as_ref().unwrap().urls.original,
            format!("/media/{new_text}/gen/original.txt")
        );
        assert!(copy.node(*new_image).unwrap().stale);

        let edge = copy.edges().next().unwrap();
        assert_eq!(edge.from_port_id, PortId::output(*new_text, "out"));
        assert_eq!(edge.to_port_id, PortId::input(*new_image, "in"));
    }
}
