//! Canvas graph structures.
//!
//! This module provides the graph representation of a canvas:
//! - [`Graph`]: nodes and edges with invariant-enforcing mutations
//! - [`GraphDefinition`]: serializable graph form (JSON-friendly)
//! - [`Edge`]: connections between node ports
//! - [`NodeUpdate`]: partial node edits
//!
//! Staleness tracking and execution planning extend [`Graph`] from their
//! own modules.

mod definition;
mod edge;
mod graph;
mod order;
mod stale;

pub use definition::GraphDefinition;
pub use edge::Edge;
pub use graph::{Graph, NodeUpdate};
