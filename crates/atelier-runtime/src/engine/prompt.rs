//! Effective prompt composition.

use atelier_core::node::{AnalyzeParams, NodeKind};
use atelier_service::generation::ResolvedInput;

/// Builds the prompt sent to the generation capability.
///
/// Canvas memory leads as a `Context:` block. Text arriving from upstream
/// nodes is the primary instruction and the node's own prompt follows it as
/// additional direction. Blocks are separated by blank lines.
///
/// Image analysis ignores upstream text and falls back to a default
/// instruction when the node has no prompt.
pub fn compose(kind: NodeKind, node_prompt: &str, canvas_memory: &str, inputs: &[ResolvedInput]) -> String {
    if kind == NodeKind::AnalyzeImage {
        let base = match node_prompt.trim() {
            "" => AnalyzeParams::DEFAULT_PROMPT,
            _ => node_prompt,
        };
        return match canvas_memory {
            "" => base.to_owned(),
            memory => format!("{memory}\n{base}").trim().to_owned(),
        };
    }

    let upstream = inputs
        .iter()
        .filter_map(ResolvedInput::as_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut parts = Vec::with_capacity(2);
    if !canvas_memory.is_empty() {
        parts.push(format!("Context:\n{canvas_memory}"));
    }
    match (upstream.is_empty(), node_prompt.is_empty()) {
        (false, false) => parts.push(format!("{upstream}\n\nAdditional direction: {node_prompt}")),
        (false, true) => parts.push(upstream),
        (true, false) => parts.push(node_prompt.to_owned()),
        (true, true) => {}
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use atelier_core::NodeId;
    use atelier_core::media::MediaType;
    use bytes::Bytes;

    use super::*;

    fn text(data: &'static str) -> ResolvedInput {
        ResolvedInput {
            port: "in".into(),
            source: NodeId::new(),
            media_type: MediaType::Text,
            data: Bytes::from_static(data.as_bytes()),
        }
    }

    #[test]
    fn memory_leads_and_upstream_is_primary() {
        let prompt = compose(
            NodeKind::GenerateImage,
            "make it neon",
            "brand: playful",
            &[text("a cat on a skateboard")],
        );
        assert_eq!(
            prompt,
            "Context:\nbrand: playful\n\na cat on a skateboard\n\nAdditional direction: make it neon"
        );
    }

    #[test]
    fn missing_parts_are_left_out() {
        assert_eq!(compose(NodeKind::GenerateText, "hello", "", &[]), "hello");
        assert_eq!(
            compose(NodeKind::GenerateText, "", "", &[text("upstream")]),
            "upstream"
        );
        assert_eq!(compose(NodeKind::GenerateText, "", "", &[]), "");
    }

    #[test]
    fn non_text_inputs_do_not_leak_into_the_prompt() {
        let image = ResolvedInput {
            port: "in".into(),
            source: NodeId::new(),
            media_type: MediaType::Image,
            data: Bytes::from_static(b"\x89PNG"),
        };
        assert_eq!(compose(NodeKind::GenerateVideo, "pan left", "", &[image]), "pan left");
    }

    #[test]
    fn analysis_uses_memory_and_default_instruction() {
        assert_eq!(
            compose(NodeKind::AnalyzeImage, "", "", &[text("ignored")]),
            AnalyzeParams::DEFAULT_PROMPT
        );
        assert_eq!(
            compose(NodeKind::AnalyzeImage, "Count the cats.", "tone: dry", &[]),
            "tone: dry\nCount the cats."
        );
    }
}
