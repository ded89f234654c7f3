//! Prelude module for convenient imports.
//!
//! ```rust
//! use atelier_service::prelude::*;
//! ```

pub use crate::context::{CanvasMemory, NoopEnricher, PromptEnricher, StaticCanvasMemory};
pub use crate::error::{Error, ErrorKind, Result};
#[cfg(feature = "test-utils")]
pub use crate::generation::{MockConfig, MockProvider};
pub use crate::generation::{
    GenerationProvider, GenerationRequest, GenerationService, MediaOutput, ResolvedInput,
};
pub use crate::repository::{GraphRepository, InMemoryGraphRepository, JsonGraphRepository};
pub use crate::storage::{
    InMemoryMediaStore, LocalMediaStore, LocalStorageConfig, MediaStore, StoredMedia,
};
