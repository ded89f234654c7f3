//! Structural graph errors.
//!
//! Every mutation that returns one of these leaves the graph unchanged.

use thiserror::Error;

use crate::id::{EdgeId, NodeId, PortId};
use crate::node::NodeKind;
use crate::port::PortType;

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised when a graph operation would violate an invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Referenced node does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// Referenced port does not exist on the node, or has the wrong direction.
    #[error("port {port} not found on node {node_id}")]
    PortNotFound { node_id: NodeId, port: PortId },

    /// Referenced edge does not exist.
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),

    /// Producer and consumer port types do not unify.
    #[error("cannot connect {from} output to {to} input")]
    IncompatiblePortType { from: PortType, to: PortType },

    /// The consumer input port already has an inbound edge.
    #[error("input port {port} on node {node_id} is already connected")]
    PortAlreadyConnected { node_id: NodeId, port: PortId },

    /// The operation would create, or encountered, a cycle.
    #[error("cycle detected between nodes {nodes:?}")]
    CycleDetected { nodes: Vec<NodeId> },

    /// Parameters do not belong to the node's kind.
    #[error("node {node_id} is {expected} but received {actual} parameters")]
    ParamsKindMismatch {
        node_id: NodeId,
        expected: NodeKind,
        actual: NodeKind,
    },

    /// A node with the same id already exists.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// A serialized graph does not satisfy the graph invariants.
    #[error("invalid graph definition: {0}")]
    InvalidDefinition(String),
}
