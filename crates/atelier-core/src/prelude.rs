//! Prelude module for convenient imports.
//!
//! ```rust
//! use atelier_core::prelude::*;
//! ```

pub use crate::error::{GraphError, GraphResult};
pub use crate::graph::{Edge, Graph, GraphDefinition, NodeUpdate};
pub use crate::id::{BatchId, EdgeId, ExecutionId, GraphId, MediaId, NodeId, PortId};
pub use crate::media::{MediaMetadata, MediaResult, MediaType, MediaUrls};
pub use crate::node::{Node, NodeKind, NodeParams, NodeStatus, Position};
pub use crate::port::{Port, PortDirection, PortType};
