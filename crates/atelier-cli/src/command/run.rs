//! `run` command.

use std::path::PathBuf;

use anyhow::Context;
use atelier_core::NodeId;
use atelier_runtime::engine::{ExecutionEventType, RunStatus};
use clap::Args;
use futures::StreamExt;

use super::{open_canvas, print_json, read_graph, write_graph};
use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// Arguments of the `run` command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Graph document to execute.
    pub file: PathBuf,

    /// Output nodes to produce; the whole graph when omitted.
    #[arg(long = "output")]
    pub outputs: Vec<NodeId>,

    /// Rerun nodes even when their results are up to date.
    #[arg(long)]
    pub force: bool,

    /// Write the executed graph, results included, back to the document.
    #[arg(long)]
    pub write_back: bool,
}

/// Executes the graph, printing every event as a JSON line.
///
/// Ctrl-C cancels the execution after the node in flight.
pub async fn execute(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let graph = read_graph(&args.file).await?;
    let canvas = open_canvas(cli).await?;
    let graph = canvas.import_graph(graph).await?;

    let execution_id = canvas
        .start_execution(graph.id, &args.outputs, args.force)
        .await
        .context("failed to start execution")?;
    let mut events = canvas.subscribe(execution_id)?;

    let canceller = canvas.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(
                target: TRACING_TARGET_COMMAND,
                execution_id = %execution_id,
                "Interrupted, cancelling execution"
            );
            let _ = canceller.cancel_execution(execution_id);
        }
    });

    let mut last = None;
    while let Some(event) = events.next().await {
        print_json(&event)?;
        last = Some(event.event_type);
    }
    interrupt.abort();

    if args.write_back {
        let executed = canvas.get_graph(graph.id).await?;
        write_graph(&args.file, &executed).await?;
    }

    match (last, canvas.execution_status(execution_id)?) {
        (Some(ExecutionEventType::Completed), RunStatus::Completed) => Ok(()),
        (_, status) => anyhow::bail!("execution {execution_id} ended as {status}"),
    }
}
