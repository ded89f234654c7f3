//! Generation output types.

use atelier_core::media::{MediaMetadata, MediaType};
use bytes::Bytes;

/// Raw media returned by a generation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaOutput {
    pub media_type: MediaType,
    pub data: Bytes,
    /// File extension of the encoded media, e.g. `png` or `wav`.
    pub format: String,
    /// Metadata reported by the backend, such as dimensions or duration.
    pub metadata: MediaMetadata,
}

impl MediaOutput {
    /// Creates an output of the given type and format.
    pub fn new(media_type: MediaType, data: impl Into<Bytes>, format: impl Into<String>) -> Self {
        Self {
            media_type,
            data: data.into(),
            format: format.into(),
            metadata: MediaMetadata::default(),
        }
    }

    /// Creates a plain-text output.
    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(MediaType::Text, text, "txt")
    }

    /// Attaches backend-reported metadata.
    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the size of the encoded media in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the output carries no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
