#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod graph;
mod id;
pub mod media;
pub mod node;
pub mod port;

#[doc(hidden)]
pub mod prelude;

pub use error::{GraphError, GraphResult};
pub use id::{BatchId, EdgeId, ExecutionId, GraphId, MediaId, NodeId, PortId};

/// Tracing target for graph model operations.
pub const TRACING_TARGET: &str = "atelier_core";
