//! Node kinds and their fixed port templates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::media::MediaType;
use crate::port::{PortSpec, PortType};

/// Kind of generation step a node performs.
///
/// The kind determines the node's port layout, which is instantiated once
/// at creation time and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    GenerateText,
    GenerateImage,
    GenerateVideo,
    GenerateSpeech,
    GenerateMusic,
    AnalyzeImage,
    TransformImage,
}

const UPSTREAM: PortSpec = PortSpec::optional("in", PortType::Any, "Upstream media used as context");
const SOURCE_IMAGE: PortSpec = PortSpec::required("image", PortType::Image, "Image to process");

const TEXT_OUT: PortSpec = PortSpec::optional("out", PortType::Text, "Generated text");
const IMAGE_OUT: PortSpec = PortSpec::optional("out", PortType::Image, "Generated image");
const VIDEO_OUT: PortSpec = PortSpec::optional("out", PortType::Video, "Generated video");
const AUDIO_OUT: PortSpec = PortSpec::optional("out", PortType::Audio, "Generated audio");
const ANALYSIS_OUT: PortSpec = PortSpec::optional("text", PortType::Text, "Image analysis");
const TRANSFORMED_OUT: PortSpec = PortSpec::optional("image", PortType::Image, "Transformed image");

/// Static input and output port layout of a node kind.
#[derive(Debug, Clone, Copy)]
pub struct NodeTemplate {
    pub inputs: &'static [PortSpec],
    pub outputs: &'static [PortSpec],
}

impl NodeKind {
    /// Returns the port layout of this kind.
    pub fn template(self) -> NodeTemplate {
        match self {
            Self::GenerateText => NodeTemplate {
                inputs: &[UPSTREAM],
                outputs: &[TEXT_OUT],
            },
            Self::GenerateImage => NodeTemplate {
                inputs: &[UPSTREAM],
                outputs: &[IMAGE_OUT],
            },
            Self::GenerateVideo => NodeTemplate {
                inputs: &[UPSTREAM],
                outputs: &[VIDEO_OUT],
            },
            Self::GenerateSpeech | Self::GenerateMusic => NodeTemplate {
                inputs: &[UPSTREAM],
                outputs: &[AUDIO_OUT],
            },
            Self::AnalyzeImage => NodeTemplate {
                inputs: &[SOURCE_IMAGE],
                outputs: &[ANALYSIS_OUT],
            },
            Self::TransformImage => NodeTemplate {
                inputs: &[SOURCE_IMAGE, UPSTREAM],
                outputs: &[TRANSFORMED_OUT],
            },
        }
    }

    /// Returns the media type a successful run of this kind produces.
    pub fn output_media_type(self) -> MediaType {
        match self {
            Self::GenerateText | Self::AnalyzeImage => MediaType::Text,
            Self::GenerateImage | Self::TransformImage => MediaType::Image,
            Self::GenerateVideo => MediaType::Video,
            Self::GenerateSpeech | Self::GenerateMusic => MediaType::Audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_kind_has_one_output_matching_its_media_type() {
        for kind in NodeKind::iter() {
            let template = kind.template();
            assert_eq!(template.outputs.len(), 1, "{kind}");
            assert!(
                template.outputs[0]
                    .port_type
                    .unifies_with(kind.output_media_type().into())
            );
        }
    }

    #[test]
    fn image_consumers_require_an_image() {
        for kind in [NodeKind::AnalyzeImage, NodeKind::TransformImage] {
            let image = kind.template().inputs[0];
            assert_eq!(image.port_type, PortType::Image);
            assert!(image.required);
        }
    }

    #[test]
    fn kinds_use_snake_case_names() {
        assert_eq!(NodeKind::GenerateSpeech.to_string(), "generate_speech");
        assert_eq!(
            "analyze_image".parse::<NodeKind>().unwrap(),
            NodeKind::AnalyzeImage
        );
    }
}
