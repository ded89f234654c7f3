//! Graph persistence.

mod json;
mod memory;

use atelier_core::GraphId;
use atelier_core::graph::Graph;
pub use json::JsonGraphRepository;
pub use memory::InMemoryGraphRepository;

use crate::Result;

/// Tracing target for repository operations.
pub const TRACING_TARGET: &str = "atelier_service::repository";

/// Storage of whole graphs keyed by id.
///
/// Passed explicitly to everything that needs it; there is no global
/// registry of graphs.
#[async_trait::async_trait]
pub trait GraphRepository: Send + Sync {
    /// Loads a graph, returning `None` if it does not exist.
    async fn load(&self, id: GraphId) -> Result<Option<Graph>>;

    /// Inserts or replaces a graph.
    async fn save(&self, graph: &Graph) -> Result<()>;

    /// Deletes a graph, returning whether it existed.
    async fn delete(&self, id: GraphId) -> Result<bool>;

    /// Lists every stored graph, oldest first.
    async fn list(&self) -> Result<Vec<Graph>>;
}
