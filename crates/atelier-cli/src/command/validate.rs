//! `validate` command.

use std::path::PathBuf;

use atelier_runtime::engine::ExecutionPlan;
use clap::Args;
use serde_json::json;

use super::{print_json, read_graph};

/// Arguments of the `validate` command.
#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Graph documents to check.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Prints one summary line per valid document; fails on the first
/// invalid one.
pub async fn execute(args: &ValidateArgs) -> anyhow::Result<()> {
    for path in &args.files {
        let graph = read_graph(path).await?;
        let plan = ExecutionPlan::new(&graph, &[])?;

        print_json(&json!({
            "file": path.display().to_string(),
            "graph_id": graph.id,
            "name": graph.name,
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
            "stale": graph.stale_nodes(),
            "order": plan.order,
        }))?;
    }
    Ok(())
}
