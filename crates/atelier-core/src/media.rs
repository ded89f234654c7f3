//! Generated media results.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::id::MediaId;
use crate::node::NodeParams;

/// Kind of media produced by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Text,
}

/// Locations of stored media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUrls {
    pub original: String,
    pub thumbnail: String,
}

impl MediaUrls {
    /// Uses the same location for the original and the thumbnail.
    pub fn same(url: impl Into<String>) -> Self {
        let original = url.into();
        Self {
            thumbnail: original.clone(),
            original,
        }
    }
}

/// Descriptive metadata of stored media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Immutable snapshot of one successful node run.
///
/// A new result replaces the previous one on every successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
    pub id: MediaId,
    pub timestamp: Timestamp,
    pub media_type: MediaType,
    pub urls: MediaUrls,
    /// Effective prompt the media was generated from.
    pub prompt: String,
    /// Composed prompt before enrichment, when enrichment rewrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
    #[serde(default)]
    pub metadata: MediaMetadata,
    /// Node parameters at the time of generation.
    pub generation_params: NodeParams,
}

impl MediaResult {
    /// Creates a result stamped with the current time.
    pub fn new(
        media_type: MediaType,
        urls: MediaUrls,
        prompt: impl Into<String>,
        metadata: MediaMetadata,
        generation_params: NodeParams,
    ) -> Self {
        Self {
            id: MediaId::new(),
            timestamp: Timestamp::now(),
            media_type,
            urls,
            prompt: prompt.into(),
            original_prompt: None,
            metadata,
            generation_params,
        }
    }

    /// Records the prompt as it was before enrichment.
    pub fn with_original_prompt(mut self, original_prompt: impl Into<String>) -> Self {
        self.original_prompt = Some(original_prompt.into());
        self
    }
}
