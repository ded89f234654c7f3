//! Media storage.
//!
//! Generated media is addressed by URLs of the form
//! `/media/{node_id}/{generation}/original.{format}`. Keeping the node id
//! as a path segment lets all media of a node be deleted or duplicated at
//! once.

mod local;
mod memory;

use atelier_core::NodeId;
use atelier_core::media::{MediaMetadata, MediaUrls};
use bytes::Bytes;
pub use local::{LocalMediaStore, LocalStorageConfig};
pub use memory::InMemoryMediaStore;
use uuid::Uuid;

use crate::generation::MediaOutput;
use crate::{Error, Result};

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "atelier_service::storage";

/// URL prefix of every stored media file.
pub const MEDIA_PREFIX: &str = "/media/";

/// Locations and metadata of freshly stored media.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub urls: MediaUrls,
    pub metadata: MediaMetadata,
}

/// Storage for generated media.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists the output of a node and returns where it can be fetched.
    async fn put(&self, node_id: NodeId, output: &MediaOutput) -> Result<StoredMedia>;

    /// Reads media back by URL. Returns `None` when nothing is stored there.
    async fn get(&self, url: &str) -> Result<Option<Bytes>>;

    /// Deletes every generation stored for a node.
    async fn delete_node_media(&self, node_id: NodeId) -> Result<()>;

    /// Copies every generation of `source` so it is addressable under `target`.
    async fn duplicate_node_media(&self, source: NodeId, target: NodeId) -> Result<()>;
}

/// Relative location of one stored media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaPath {
    pub node_id: NodeId,
    pub generation: String,
    pub file: String,
}

impl MediaPath {
    /// Allocates a new generation for a node's output.
    pub fn allocate(node_id: NodeId, format: &str) -> Self {
        let generation = Uuid::new_v4().simple().to_string()[..12].to_owned();
        Self {
            node_id,
            generation,
            file: format!("original.{format}"),
        }
    }

    /// Parses a media URL, rejecting anything outside the media layout.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::invalid_input().with_message(format!("invalid media url: {url}"));
        let relative = url.strip_prefix(MEDIA_PREFIX).ok_or_else(invalid)?;

        let mut segments = relative.split('/');
        let (Some(node), Some(generation), Some(file), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid());
        };

        let safe = |segment: &str| {
            !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
        };
        if !safe(generation) || !safe(file) {
            return Err(invalid());
        }

        Ok(Self {
            node_id: node.parse().map_err(|_| invalid())?,
            generation: generation.to_owned(),
            file: file.to_owned(),
        })
    }

    /// Returns the path relative to the media root.
    pub fn relative(&self) -> String {
        format!("{}/{}/{}", self.node_id, self.generation, self.file)
    }

    /// Returns the public URL.
    pub fn url(&self) -> String {
        format!("{MEDIA_PREFIX}{}", self.relative())
    }
}

/// Merges backend-reported metadata with what storage knows for certain.
pub(crate) fn stored_metadata(output: &MediaOutput) -> MediaMetadata {
    MediaMetadata {
        format: Some(output.format.clone()),
        size_bytes: Some(output.data.len() as u64),
        ..output.metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_path_roundtrips_through_url() {
        let path = MediaPath::allocate(NodeId::new(), "png");
        assert_eq!(path.generation.len(), 12);
        assert_eq!(MediaPath::parse(&path.url()).unwrap(), path);
    }

    #[test]
    fn urls_outside_the_layout_are_rejected() {
        let node = NodeId::new();
        for url in [
            "/elsewhere/a/b/c".to_owned(),
            format!("/media/{node}/gen"),
            format!("/media/{node}/../original.png"),
            format!("/media/{node}/gen/original.png/extra"),
            "/media/not-a-node/gen/original.png".to_owned(),
        ] {
            assert!(MediaPath::parse(&url).is_err(), "{url}");
        }
    }
}
