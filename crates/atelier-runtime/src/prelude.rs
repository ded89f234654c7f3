//! Prelude module for convenient imports.
//!
//! ```rust
//! use atelier_runtime::prelude::*;
//! ```

pub use crate::canvas::{BatchEventStream, Canvas, ExecutionEventStream, GraphUpdate};
pub use crate::engine::{
    BatchEventType, BatchExecutionEvent, EngineConfig, EngineConfigBuilder, ExecutionEvent,
    ExecutionEventType, KindConcurrency, RunStatus,
};
pub use crate::error::{NodeError, RuntimeError, RuntimeResult};
