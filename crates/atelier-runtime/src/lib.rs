#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod canvas;
pub mod engine;
mod error;

#[doc(hidden)]
pub mod prelude;

pub use canvas::Canvas;
pub use engine::EngineConfig;
pub use error::{NodeError, RuntimeError, RuntimeResult};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "atelier_runtime";
