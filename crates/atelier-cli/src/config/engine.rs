//! Execution engine configuration.

use std::time::Duration;

use anyhow::Context;
use atelier_runtime::EngineConfig;
use clap::Args;

/// Engine settings exposed on the command line.
#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// Maximum number of graphs a batch runs at the same time.
    #[arg(long, env = "ATELIER_MAX_CONCURRENT_GRAPHS", default_value_t = 1)]
    pub max_concurrent_graphs: usize,

    /// Deadline for a single generation call, in seconds.
    #[arg(long, env = "ATELIER_GENERATION_TIMEOUT", default_value_t = 300)]
    pub generation_timeout: u64,
}

impl EngineArgs {
    /// Builds and validates the engine configuration.
    pub fn to_engine_config(&self) -> anyhow::Result<EngineConfig> {
        EngineConfig::builder()
            .max_concurrent_graphs(self.max_concurrent_graphs)
            .generation_timeout(Duration::from_secs(self.generation_timeout))
            .build()
            .context("invalid engine configuration")
    }
}
