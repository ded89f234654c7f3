//! Subcommands.

mod batch;
mod run;
mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use atelier_core::graph::Graph;
use atelier_runtime::Canvas;
use atelier_service::generation::GenerationService;
use atelier_service::{JsonGraphRepository, LocalMediaStore};
pub use batch::BatchArgs;
use clap::Subcommand;
pub use run::RunArgs;
use serde::Serialize;
pub use validate::ValidateArgs;

use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check graph documents and print their execution order.
    Validate(ValidateArgs),
    /// Execute one graph and stream its events.
    Run(RunArgs),
    /// Execute several graphs as one batch and stream its events.
    Batch(BatchArgs),
}

/// Runs the selected command.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Validate(args) => validate::execute(args).await,
        Command::Run(args) => run::execute(&cli, args).await,
        Command::Batch(args) => batch::execute(&cli, args).await,
    }
}

/// Reads and validates a graph document.
pub async fn read_graph(path: &Path) -> anyhow::Result<Graph> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let graph: Graph = serde_json::from_str(&contents)
        .with_context(|| format!("invalid graph document {}", path.display()))?;

    tracing::debug!(
        target: TRACING_TARGET_COMMAND,
        path = %path.display(),
        graph_id = %graph.id,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Graph document loaded"
    );
    Ok(graph)
}

/// Writes a graph document as pretty-printed JSON.
pub async fn write_graph(path: &Path, graph: &Graph) -> anyhow::Result<()> {
    let contents = serde_json::to_string_pretty(graph).context("failed to serialize graph")?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Opens a canvas over the configured storage and the mock backend.
pub async fn open_canvas(cli: &Cli) -> anyhow::Result<Canvas> {
    let repository = JsonGraphRepository::open(&cli.storage)
        .await
        .context("failed to open graph repository")?;
    let media = LocalMediaStore::open(&cli.storage)
        .await
        .context("failed to open media store")?;
    let generation = GenerationService::mock_with_config(cli.mock.clone());
    let config = cli.engine.to_engine_config()?;

    Ok(Canvas::new(
        Arc::new(repository),
        Arc::new(media),
        generation,
        config,
    ))
}

/// Prints a value to stdout as one JSON line.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let line = serde_json::to_string(value).context("failed to serialize output")?;
    println!("{line}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use atelier_core::PortId;
    use atelier_core::node::{NodeKind, NodeParams, Position};

    use super::*;

    #[tokio::test]
    async fn graph_documents_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut graph = Graph::new("storyboard");
        let text = graph
            .add_node(
                "Script",
                NodeParams::with_prompt(NodeKind::GenerateText, "a harbour"),
                Position::default(),
            )
            .id;
        let image = graph
            .add_node(
                "Frame",
                NodeParams::default_for(NodeKind::GenerateImage),
                Position::new(240.0, 0.0),
            )
            .id;
        graph
            .add_edge(
                text,
                &PortId::output(text, "out"),
                image,
                &PortId::input(image, "in"),
            )
            .unwrap();

        write_graph(&path, &graph).await.unwrap();
        let restored = read_graph(&path).await.unwrap();
        assert_eq!(restored.to_definition(), graph.to_definition());
    }

    #[tokio::test]
    async fn malformed_documents_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, r#"{"name": 3}"#).await.unwrap();

        let error = read_graph(&path).await.unwrap_err();
        assert!(format!("{error:#}").contains("invalid graph document"));
        assert!(read_graph(&dir.path().join("missing.json")).await.is_err());
    }
}
