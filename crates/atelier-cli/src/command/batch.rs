//! `batch` command.

use std::path::PathBuf;

use anyhow::Context;
use atelier_runtime::engine::RunStatus;
use clap::Args;
use futures::StreamExt;

use super::{open_canvas, print_json, read_graph};
use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// Arguments of the `batch` command.
#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Graph documents to execute, in start order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Rerun nodes even when their results are up to date.
    #[arg(long)]
    pub force: bool,
}

/// Runs every graph as one batch, printing every event as a JSON line.
///
/// Ctrl-C keeps further graphs from starting.
pub async fn execute(cli: &Cli, args: &BatchArgs) -> anyhow::Result<()> {
    let canvas = open_canvas(cli).await?;
    let mut graph_ids = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let graph = read_graph(path).await?;
        graph_ids.push(canvas.import_graph(graph).await?.id);
    }

    let batch_id = canvas
        .start_batch(&graph_ids, args.force)
        .await
        .context("failed to start batch")?;
    let mut events = canvas.subscribe_batch(batch_id)?;

    let canceller = canvas.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(
                target: TRACING_TARGET_COMMAND,
                batch_id = %batch_id,
                "Interrupted, cancelling batch"
            );
            let _ = canceller.cancel_batch(batch_id);
        }
    });

    while let Some(event) = events.next().await {
        print_json(&event)?;
    }
    interrupt.abort();

    match canvas.batch_status(batch_id)? {
        RunStatus::Completed => Ok(()),
        status => anyhow::bail!("batch {batch_id} ended as {status}"),
    }
}
