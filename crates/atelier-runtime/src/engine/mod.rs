//! Execution engine.
//!
//! - [`NodeExecutor`]: runs one node against upstream results
//! - [`GraphExecutor`]: runs a planned graph in dependency order
//! - [`BatchExecutor`]: runs independent graphs as one unit
//! - [`EngineConfig`]: configuration options

mod batch;
mod config;
mod event;
mod graph;
mod guard;
mod node;
pub mod prompt;

pub use batch::{BatchExecutor, BatchPlan};
pub use config::{
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_KIND_CONCURRENCY, DEFAULT_RUN_RETENTION, EngineConfig,
    EngineConfigBuilder, KindConcurrency,
};
pub use event::{
    BatchEventType, BatchExecutionEvent, ExecutionEvent, ExecutionEventType, RunEvent, RunStatus,
    SKIP_REASON,
};
pub use graph::{ExecutionPlan, GraphExecutor, RunOutcome};
pub use guard::{GraphGuard, RunningGraphs};
pub use node::NodeExecutor;

/// Tracing target for engine operations.
pub const TRACING_TARGET: &str = "atelier_runtime::engine";
