//! In-memory media store.

use std::collections::HashMap;
use std::sync::Arc;

use atelier_core::NodeId;
use atelier_core::media::MediaUrls;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{MediaPath, MediaStore, StoredMedia, TRACING_TARGET, stored_metadata};
use crate::Result;
use crate::generation::MediaOutput;

/// Media store keeping every file in memory.
///
/// Clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaStore {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryMediaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored files.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Returns whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put(&self, node_id: NodeId, output: &MediaOutput) -> Result<StoredMedia> {
        let path = MediaPath::allocate(node_id, &output.format);
        self.files
            .write()
            .await
            .insert(path.relative(), output.data.clone());

        tracing::trace!(
            target: TRACING_TARGET,
            node_id = %node_id,
            path = %path.relative(),
            "Stored media in memory"
        );

        Ok(StoredMedia {
            urls: MediaUrls::same(path.url()),
            metadata: stored_metadata(output),
        })
    }

    async fn get(&self, url: &str) -> Result<Option<Bytes>> {
        let path = MediaPath::parse(url)?;
        Ok(self.files.read().await.get(&path.relative()).cloned())
    }

    async fn delete_node_media(&self, node_id: NodeId) -> Result<()> {
        let prefix = format!("{node_id}/");
        self.files
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn duplicate_node_media(&self, source: NodeId, target: NodeId) -> Result<()> {
        let (from, to) = (format!("{source}/"), format!("{target}/"));
        let mut files = self.files.write().await;
        let copies: Vec<(String, Bytes)> = files
            .iter()
            .filter_map(|(key, data)| {
                key.strip_prefix(&from)
                    .map(|rest| (format!("{to}{rest}"), data.clone()))
            })
            .collect();
        files.extend(copies);
        Ok(())
    }
}
