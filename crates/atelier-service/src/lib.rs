#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod context;
mod error;
pub mod generation;
#[doc(hidden)]
pub mod prelude;
pub mod repository;
pub mod storage;

pub use context::{CanvasMemory, NoopEnricher, PromptEnricher, StaticCanvasMemory};
pub use error::{BoxedError, Error, ErrorKind, Result};
#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub use generation::{MockConfig, MockProvider};
pub use generation::{GenerationProvider, GenerationService};
pub use repository::{GraphRepository, InMemoryGraphRepository, JsonGraphRepository};
pub use storage::{InMemoryMediaStore, LocalMediaStore, LocalStorageConfig, MediaStore};
