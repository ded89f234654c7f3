//! Canvas memory resolution and prompt enrichment.

use atelier_core::graph::Graph;
use atelier_core::node::NodeKind;

use crate::Result;

/// Resolves the shared context prepended to every prompt of a graph.
#[async_trait::async_trait]
pub trait CanvasMemory: Send + Sync {
    /// Returns the context text for the given graph.
    async fn resolve(&self, graph: &Graph) -> Result<String>;
}

/// Uses the graph's own `canvas_memory` text verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCanvasMemory;

#[async_trait::async_trait]
impl CanvasMemory for StaticCanvasMemory {
    async fn resolve(&self, graph: &Graph) -> Result<String> {
        Ok(graph.canvas_memory.clone())
    }
}

/// Rewrites a composed prompt before it reaches the generation provider.
///
/// Only consulted for nodes that opt in through their parameters.
#[async_trait::async_trait]
pub trait PromptEnricher: Send + Sync {
    /// Returns the enriched prompt for a node of the given kind.
    async fn enrich(&self, prompt: &str, kind: NodeKind) -> Result<String>;
}

/// Returns every prompt unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

#[async_trait::async_trait]
impl PromptEnricher for NoopEnricher {
    async fn enrich(&self, prompt: &str, _kind: NodeKind) -> Result<String> {
        Ok(prompt.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_memory_and_noop_enricher_pass_text_through() {
        let mut graph = Graph::new("board");
        graph.canvas_memory = "muted palette".into();
        assert_eq!(StaticCanvasMemory.resolve(&graph).await.unwrap(), "muted palette");

        let prompt = NoopEnricher
            .enrich("a lighthouse", NodeKind::GenerateImage)
            .await
            .unwrap();
        assert_eq!(prompt, "a lighthouse");
    }
}
