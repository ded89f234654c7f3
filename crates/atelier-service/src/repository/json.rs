//! JSON file graph repository.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use atelier_core::GraphId;
use atelier_core::graph::Graph;
use tokio::fs;

use super::{GraphRepository, TRACING_TARGET};
use crate::Result;
use crate::storage::LocalStorageConfig;

/// Graph repository storing one pretty-printed JSON document per graph
/// under `<storage_path>/graphs/<graph_id>.json`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonGraphRepository {
    directory: PathBuf,
}

impl JsonGraphRepository {
    /// Opens the repository, creating the graphs directory if needed.
    pub async fn open(config: &LocalStorageConfig) -> Result<Self> {
        let directory = config.graphs_dir();
        fs::create_dir_all(&directory).await?;

        tracing::info!(
            target: TRACING_TARGET,
            directory = %directory.display(),
            "Opened JSON graph repository"
        );

        Ok(Self { directory })
    }

    /// Returns the directory holding graph documents.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, id: GraphId) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }
}

#[async_trait::async_trait]
impl GraphRepository for JsonGraphRepository {
    async fn load(&self, id: GraphId) -> Result<Option<Graph>> {
        let data = match fs::read(self.path(id)).await {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    async fn save(&self, graph: &Graph) -> Result<()> {
        let data = serde_json::to_vec_pretty(graph)?;
        let path = self.path(graph.id);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, data).await?;
        fs::rename(&staging, &path).await?;

        tracing::trace!(
            target: TRACING_TARGET,
            graph_id = %graph.id,
            nodes = graph.node_count(),
            "Saved graph"
        );
        Ok(())
    }

    async fn delete(&self, id: GraphId) -> Result<bool> {
        match fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Graph>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|extension| extension == "json") {
                paths.push(path);
            }
        }

        let mut graphs = Vec::with_capacity(paths.len());
        for path in paths {
            let data = fs::read(&path).await?;
            match serde_json::from_slice::<Graph>(&data) {
                Ok(graph) => graphs.push(graph),
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        path = %path.display(),
                        error = %error,
                        "Skipping unreadable graph document"
                    );
                }
            }
        }

        graphs.sort_by_key(|graph| (graph.created_at, graph.id));
        Ok(graphs)
    }
}
