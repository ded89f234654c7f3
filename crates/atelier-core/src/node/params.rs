//! Typed generation parameters, one schema per node kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NodeKind;

/// Provider-specific tuning knobs passed through without interpretation.
pub type ExtraParams = Map<String, Value>;

/// Parameters of a text generation node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

/// Parameters of an image generation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            aspect_ratio: "1:1".to_owned(),
            negative_prompt: None,
            extra: ExtraParams::new(),
        }
    }
}

/// Parameters of a video generation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Treats up to three upstream images as subject references instead of
    /// using the first one as the opening frame.
    pub reference_mode: bool,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            aspect_ratio: "16:9".to_owned(),
            duration_seconds: None,
            reference_mode: false,
            extra: ExtraParams::new(),
        }
    }
}

/// Parameters of a speech synthesis node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub voice: String,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            voice: "Kore".to_owned(),
            extra: ExtraParams::new(),
        }
    }
}

/// Parameters of a music generation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub duration_seconds: u32,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for MusicParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            duration_seconds: 10,
            extra: ExtraParams::new(),
        }
    }
}

/// Parameters of an image analysis node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl AnalyzeParams {
    /// Instruction used when the node has no prompt of its own.
    pub const DEFAULT_PROMPT: &'static str = "Describe this image in detail.";
}

impl Default for AnalyzeParams {
    fn default() -> Self {
        Self {
            prompt: Self::DEFAULT_PROMPT.to_owned(),
            model: None,
            extra: ExtraParams::new(),
        }
    }
}

/// Parameters of an image transformation node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

/// Generation parameters of a node, tagged by node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeParams {
    GenerateText(TextParams),
    GenerateImage(ImageParams),
    GenerateVideo(VideoParams),
    GenerateSpeech(SpeechParams),
    GenerateMusic(MusicParams),
    AnalyzeImage(AnalyzeParams),
    TransformImage(TransformParams),
}

impl NodeParams {
    /// Returns the default parameters for a node kind.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::GenerateText => Self::GenerateText(TextParams::default()),
            NodeKind::GenerateImage => Self::GenerateImage(ImageParams::default()),
            NodeKind::GenerateVideo => Self::GenerateVideo(VideoParams::default()),
            NodeKind::GenerateSpeech => Self::GenerateSpeech(SpeechParams::default()),
            NodeKind::GenerateMusic => Self::GenerateMusic(MusicParams::default()),
            NodeKind::AnalyzeImage => Self::AnalyzeImage(AnalyzeParams::default()),
            NodeKind::TransformImage => Self::TransformImage(TransformParams::default()),
        }
    }

    /// Returns the default parameters of `kind` with the given prompt.
    pub fn with_prompt(kind: NodeKind, prompt: impl Into<String>) -> Self {
        let mut params = Self::default_for(kind);
        params.set_prompt(prompt);
        params
    }

    /// Returns the node kind these parameters belong to.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::GenerateText(_) => NodeKind::GenerateText,
            Self::GenerateImage(_) => NodeKind::GenerateImage,
            Self::GenerateVideo(_) => NodeKind::GenerateVideo,
            Self::GenerateSpeech(_) => NodeKind::GenerateSpeech,
            Self::GenerateMusic(_) => NodeKind::GenerateMusic,
            Self::AnalyzeImage(_) => NodeKind::AnalyzeImage,
            Self::TransformImage(_) => NodeKind::TransformImage,
        }
    }

    /// Returns the node's own prompt.
    pub fn prompt(&self) -> &str {
        match self {
            Self::GenerateText(p) => &p.prompt,
            Self::GenerateImage(p) => &p.prompt,
            Self::GenerateVideo(p) => &p.prompt,
            Self::GenerateSpeech(p) => &p.prompt,
            Self::GenerateMusic(p) => &p.prompt,
            Self::AnalyzeImage(p) => &p.prompt,
            Self::TransformImage(p) => &p.prompt,
        }
    }

    /// Replaces the node's own prompt.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        match self {
            Self::GenerateText(p) => p.prompt = prompt,
            Self::GenerateImage(p) => p.prompt = prompt,
            Self::GenerateVideo(p) => p.prompt = prompt,
            Self::GenerateSpeech(p) => p.prompt = prompt,
            Self::GenerateMusic(p) => p.prompt = prompt,
            Self::AnalyzeImage(p) => p.prompt = prompt,
            Self::TransformImage(p) => p.prompt = prompt,
        }
    }

    /// Returns the requested model, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::GenerateText(p) => p.model.as_deref(),
            Self::GenerateImage(p) => p.model.as_deref(),
            Self::GenerateVideo(p) => p.model.as_deref(),
            Self::GenerateSpeech(p) => p.model.as_deref(),
            Self::GenerateMusic(p) => p.model.as_deref(),
            Self::AnalyzeImage(p) => p.model.as_deref(),
            Self::TransformImage(p) => p.model.as_deref(),
        }
    }

    /// Returns the uninterpreted passthrough parameters.
    pub fn extra(&self) -> &ExtraParams {
        match self {
            Self::GenerateText(p) => &p.extra,
            Self::GenerateImage(p) => &p.extra,
            Self::GenerateVideo(p) => &p.extra,
            Self::GenerateSpeech(p) => &p.extra,
            Self::GenerateMusic(p) => &p.extra,
            Self::AnalyzeImage(p) => &p.extra,
            Self::TransformImage(p) => &p.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn params_are_tagged_by_kind() {
        let params = NodeParams::with_prompt(NodeKind::GenerateImage, "a lighthouse");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["type"], "generate_image");
        assert_eq!(value["prompt"], "a lighthouse");
        assert_eq!(value["aspect_ratio"], "1:1");
    }

    #[test]
    fn unknown_fields_land_in_extra() {
        let params: NodeParams = serde_json::from_value(json!({
            "type": "generate_text",
            "prompt": "hook",
            "temperature": 0.5,
            "top_k": 40
        }))
        .unwrap();

        let NodeParams::GenerateText(text) = &params else {
            panic!("expected text params");
        };
        assert_eq!(text.temperature, Some(0.5));
        assert_eq!(params.extra().get("top_k"), Some(&json!(40)));
        assert!(!params.extra().contains_key("type"));
    }

    #[test]
    fn missing_fields_use_kind_defaults() {
        let params: NodeParams =
            serde_json::from_value(json!({ "type": "analyze_image" })).unwrap();
        assert_eq!(params.prompt(), AnalyzeParams::DEFAULT_PROMPT);
        assert_eq!(params.kind(), NodeKind::AnalyzeImage);
    }
}
