//! Edges between node ports.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId, PortId};

/// A directed, single-valued data dependency from an output port to an
/// input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from_node_id: NodeId,
    pub from_port_id: PortId,
    pub to_node_id: NodeId,
    pub to_port_id: PortId,
}

impl Edge {
    /// Creates an edge with a fresh id.
    pub fn new(from_node_id: NodeId, from_port_id: PortId, to_node_id: NodeId, to_port_id: PortId) -> Self {
        Self {
            id: EdgeId::new(),
            from_node_id,
            from_port_id,
            to_node_id,
            to_port_id,
        }
    }

    /// Returns whether the edge touches the given node.
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.from_node_id == node_id || self.to_node_id == node_id
    }
}
