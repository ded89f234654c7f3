//! Engine configuration.

use std::collections::HashMap;
use std::time::Duration;

use atelier_core::node::NodeKind;
use derive_builder::Builder;

/// Default deadline of a single generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time a finished run stays queryable.
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(600);

/// Concurrency ceiling of a node kind without an explicit entry.
pub const DEFAULT_KIND_CONCURRENCY: usize = 4;

/// Maximum number of in-flight generation calls per node kind.
///
/// The ceilings are shared by every execution of one canvas, so a batch of
/// video graphs cannot flood the video provider even when the batch itself
/// allows more graphs at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindConcurrency {
    limits: HashMap<NodeKind, usize>,
}

impl KindConcurrency {
    /// Returns the ceiling of the given kind.
    pub fn limit(&self, kind: NodeKind) -> usize {
        self.limits
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_KIND_CONCURRENCY)
    }

    /// Overrides the ceiling of one kind.
    pub fn with_limit(mut self, kind: NodeKind, limit: usize) -> Self {
        self.limits.insert(kind, limit);
        self
    }

    fn zero_limit(&self) -> Option<NodeKind> {
        self.limits
            .iter()
            .find_map(|(kind, limit)| (*limit == 0).then_some(*kind))
    }
}

impl Default for KindConcurrency {
    fn default() -> Self {
        let limits = HashMap::from([
            (NodeKind::GenerateText, 10),
            (NodeKind::AnalyzeImage, 8),
            (NodeKind::GenerateImage, 4),
            (NodeKind::TransformImage, 4),
            (NodeKind::GenerateSpeech, 4),
            (NodeKind::GenerateMusic, 3),
            (NodeKind::GenerateVideo, 2),
        ]);
        Self { limits }
    }
}

/// Configuration for the execution engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Maximum number of graphs of one batch running at the same time.
    #[builder(default = "1")]
    pub max_concurrent_graphs: usize,

    /// Deadline forwarded to the generation service for every node.
    #[builder(default = "DEFAULT_GENERATION_TIMEOUT")]
    pub generation_timeout: Duration,

    /// Saves the graph after every node transition, not only at the end.
    #[builder(default = "true")]
    pub persist_each_node: bool,

    /// Per-kind ceiling on concurrent generation calls.
    #[builder(default)]
    pub kind_concurrency: KindConcurrency,

    /// How long a finished execution or batch keeps its status and unread
    /// events.
    #[builder(default = "DEFAULT_RUN_RETENTION")]
    pub run_retention: Duration,
}

impl EngineConfig {
    /// Returns a builder for the configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_concurrent_graphs
            && max == 0
        {
            return Err("max_concurrent_graphs must be at least 1".into());
        }
        if let Some(timeout) = self.generation_timeout
            && timeout.is_zero()
        {
            return Err("generation_timeout must be positive".into());
        }
        if let Some(kinds) = &self.kind_concurrency
            && let Some(kind) = kinds.zero_limit()
        {
            return Err(format!("concurrency limit of {kind} must be at least 1"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_graphs: 1,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            persist_each_node: true,
            kind_concurrency: KindConcurrency::default(),
            run_retention: DEFAULT_RUN_RETENTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.max_concurrent_graphs, 1);
        assert_eq!(config.generation_timeout, DEFAULT_GENERATION_TIMEOUT);
        assert!(config.persist_each_node);
        assert_eq!(config.kind_concurrency.limit(NodeKind::GenerateVideo), 2);
        assert_eq!(config.kind_concurrency.limit(NodeKind::GenerateText), 10);
        assert_eq!(config.run_retention, DEFAULT_RUN_RETENTION);
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let result = EngineConfig::builder().max_concurrent_graphs(0usize).build();
        assert!(result.is_err());

        let result = EngineConfig::builder()
            .generation_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());

        let kinds = KindConcurrency::default().with_limit(NodeKind::GenerateMusic, 0);
        let result = EngineConfig::builder().kind_concurrency(kinds).build();
        assert!(result.is_err());
    }
}
