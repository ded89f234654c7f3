//! Generation request types.

use std::borrow::Cow;
use std::time::Duration;

use atelier_core::NodeId;
use atelier_core::media::MediaType;
use atelier_core::node::{NodeKind, NodeParams};
use bytes::Bytes;
use uuid::Uuid;

/// Upstream media bound to one of the node's input ports.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// Name of the input port the media arrived on.
    pub port: String,
    /// Node that produced the media.
    pub source: NodeId,
    pub media_type: MediaType,
    pub data: Bytes,
}

impl ResolvedInput {
    /// Returns the data as text when the input is textual.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        (self.media_type == MediaType::Text).then(|| String::from_utf8_lossy(&self.data))
    }
}

/// Request to generate media for one node.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    pub node_id: NodeId,
    pub kind: NodeKind,
    /// Prompt after canvas memory and upstream text were composed in.
    pub prompt: String,
    pub inputs: Vec<ResolvedInput>,
    pub params: NodeParams,
    /// Deadline for the call; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    /// Creates a request for a node with the given effective prompt.
    pub fn new(node_id: NodeId, params: NodeParams, prompt: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            node_id,
            kind: params.kind(),
            prompt: prompt.into(),
            inputs: Vec::new(),
            params,
            timeout: None,
        }
    }

    /// Attaches resolved upstream inputs.
    pub fn with_inputs(mut self, inputs: Vec<ResolvedInput>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the deadline of the call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns inputs of the given media type in port order.
    pub fn inputs_of(&self, media_type: MediaType) -> impl Iterator<Item = &ResolvedInput> {
        self.inputs
            .iter()
            .filter(move |input| input.media_type == media_type)
    }

    /// Returns the input bound to the named port.
    pub fn input(&self, port: &str) -> Option<&ResolvedInput> {
        self.inputs.iter().find(|input| input.port == port)
    }
}
