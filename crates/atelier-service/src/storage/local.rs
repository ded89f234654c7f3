//! Filesystem media store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use atelier_core::NodeId;
use atelier_core::media::MediaUrls;
use bytes::Bytes;
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{MediaPath, MediaStore, StoredMedia, TRACING_TARGET, stored_metadata};
use crate::Result;
use crate::generation::MediaOutput;

/// Configuration of the filesystem-backed stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct LocalStorageConfig {
    /// Root directory for graphs and media.
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-path", env = "ATELIER_STORAGE_PATH", default_value = "./data")
    )]
    pub storage_path: PathBuf,
}

impl LocalStorageConfig {
    /// Creates a configuration rooted at the given directory.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    /// Returns the directory holding media files.
    pub fn media_dir(&self) -> PathBuf {
        self.storage_path.join("media")
    }

    /// Returns the directory holding graph documents.
    pub fn graphs_dir(&self) -> PathBuf {
        self.storage_path.join("graphs")
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}

/// Media store writing files under `<storage_path>/media`.
///
/// Each generation lives in its own directory,
/// `<node_id>/<generation>/original.<format>`. The thumbnail URL points at
/// the original file.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    /// Opens the store, creating the media directory if needed.
    pub async fn open(config: &LocalStorageConfig) -> Result<Self> {
        let root = config.media_dir();
        fs::create_dir_all(&root).await?;

        tracing::info!(
            target: TRACING_TARGET,
            root = %root.display(),
            "Opened local media store"
        );

        Ok(Self { root })
    }

    /// Returns the media root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn node_dir(&self, node_id: NodeId) -> PathBuf {
        self.root.join(node_id.to_string())
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, node_id: NodeId, output: &MediaOutput) -> Result<StoredMedia> {
        let path = MediaPath::allocate(node_id, &output.format);
        let directory = self.node_dir(node_id).join(&path.generation);
        fs::create_dir_all(&directory).await?;
        fs::write(directory.join(&path.file), &output.data).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            node_id = %node_id,
            path = %path.relative(),
            size_bytes = output.len(),
            "Stored media on disk"
        );

        Ok(StoredMedia {
            urls: MediaUrls::same(path.url()),
            metadata: stored_metadata(output),
        })
    }

    async fn get(&self, url: &str) -> Result<Option<Bytes>> {
        let path = MediaPath::parse(url)?;
        match fs::read(self.root.join(path.relative())).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn delete_node_media(&self, node_id: NodeId) -> Result<()> {
        match fs::remove_dir_all(self.node_dir(node_id)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn duplicate_node_media(&self, source: NodeId, target: NodeId) -> Result<()> {
        let source_dir = self.node_dir(source);
        let mut generations = match fs::read_dir(&source_dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error.into()),
        };

        let target_dir = self.node_dir(target);
        while let Some(generation) = generations.next_entry().await? {
            if !generation.file_type().await?.is_dir() {
                continue;
            }
            let copy_dir = target_dir.join(generation.file_name());
            fs::create_dir_all(&copy_dir).await?;

            let mut files = fs::read_dir(generation.path()).await?;
            while let Some(file) = files.next_entry().await? {
                if file.file_type().await?.is_file() {
                    fs::copy(file.path(), copy_dir.join(file.file_name())).await?;
                }
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            source = %source,
            target = %target,
            "Duplicated node media"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use atelier_core::media::MediaType;

    use super::*;

    async fn store() -> (tempfile::TempDir, LocalMediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::open(&LocalStorageConfig::new(dir.path()))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_writes_under_node_and_generation() {
        let (dir, store) = store().await;
        let node = NodeId::new();
        let output = MediaOutput::new(MediaType::Image, b"\x89PNG".to_vec(), "png");

        let stored = store.put(node, &output).await.unwrap();
        assert_eq!(stored.urls.original, stored.urls.thumbnail);
        assert_eq!(stored.metadata.format.as_deref(), Some("png"));

        let relative = stored.urls.original.trim_start_matches('/');
        assert!(dir.path().join(relative).is_file());
        let data = store.get(&stored.urls.original).await.unwrap().unwrap();
        assert_eq!(&data[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn missing_media_reads_as_none() {
        let (_dir, store) = store().await;
        let url = format!("/media/{}/abc/original.png", NodeId::new());
        assert!(store.get(&url).await.unwrap().is_none());
        assert!(store.get("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_copies_every_generation() {
        let (_dir, store) = store().await;
        let (source, target) = (NodeId::new(), NodeId::new());
        let first = store.put(source, &MediaOutput::text("one")).await.unwrap();
        let second = store.put(source, &MediaOutput::text("two")).await.unwrap();

        store.duplicate_node_media(source, target).await.unwrap();
        for stored in [first, second] {
            let url = stored
                .urls
                .original
                .replacen(&source.to_string(), &target.to_string(), 1);
            assert!(store.get(&url).await.unwrap().is_some());
        }

        store.delete_node_media(source).await.unwrap();
        store.delete_node_media(source).await.unwrap();
        assert!(!store.root().join(source.to_string()).exists());
        assert!(store.root().join(target.to_string()).exists());
    }
}
