//! Canvas nodes.

mod kind;
mod params;

pub use kind::{NodeKind, NodeTemplate};
pub use params::{
    AnalyzeParams, ExtraParams, ImageParams, MusicParams, NodeParams, SpeechParams, TextParams,
    TransformParams, VideoParams,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::id::{NodeId, PortId};
use crate::media::MediaResult;
use crate::port::{Port, PortDirection};

/// Execution status of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Completed,
    Failed,
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single generation step on the canvas.
///
/// Ports are instantiated from the kind's template when the node is created
/// and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    kind: NodeKind,
    pub label: String,
    pub(crate) params: NodeParams,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub status: NodeStatus,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MediaResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stale: bool,
}

impl Node {
    /// Creates an idle node with ports taken from the kind's template.
    pub fn new(id: NodeId, label: impl Into<String>, params: NodeParams, position: Position) -> Self {
        let kind = params.kind();
        let template = kind.template();
        let ports = |direction, specs: &[crate::port::PortSpec]| {
            specs
                .iter()
                .map(|spec| Port::from_spec(id, direction, spec))
                .collect::<Vec<_>>()
        };

        Self {
            id,
            kind,
            label: label.into(),
            input_ports: ports(PortDirection::Input, template.inputs),
            output_ports: ports(PortDirection::Output, template.outputs),
            params,
            position,
            status: NodeStatus::Idle,
            result: None,
            error_message: None,
            stale: false,
        }
    }

    /// Returns the node kind.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the generation parameters.
    #[inline]
    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    /// Returns the ordered input ports.
    #[inline]
    pub fn input_ports(&self) -> &[Port] {
        &self.input_ports
    }

    /// Returns the ordered output ports.
    #[inline]
    pub fn output_ports(&self) -> &[Port] {
        &self.output_ports
    }

    /// Finds a port on this node by id, regardless of direction.
    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.input_ports
            .iter()
            .chain(self.output_ports.iter())
            .find(|port| &port.id == id)
    }

    /// Finds an input port by name.
    pub fn input_port(&self, name: &str) -> Option<&Port> {
        self.input_ports.iter().find(|port| port.name == name)
    }

    /// Finds an output port by name.
    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.output_ports.iter().find(|port| port.name == name)
    }

    /// Returns whether the node must run to bring its result up to date.
    ///
    /// A node needs a run when it is stale, has no result, or its last run
    /// failed.
    pub fn needs_run(&self) -> bool {
        self.stale || self.result.is_none() || self.status == NodeStatus::Failed
    }

    /// Returns whether the ports match the kind's template.
    pub(crate) fn has_template_ports(&self) -> bool {
        let fresh = Node::new(self.id, "", self.params.clone(), self.position);
        fresh.input_ports == self.input_ports && fresh.output_ports == self.output_ports
    }

    /// Copies the node under a new id, rebuilding its ports for that id.
    ///
    /// Media URLs in the result have the old node id segment replaced with
    /// the new one.
    pub(crate) fn reassign(&self, id: NodeId) -> Node {
        let mut node = Node::new(id, self.label.clone(), self.params.clone(), self.position);
        let (from, to) = (format!("/{}/", self.id), format!("/{id}/"));
        node.result = self.result.clone().map(|mut result| {
            result.urls.original = result.urls.original.replacen(&from, &to, 1);
            result.urls.thumbnail = result.urls.thumbnail.replacen(&from, &to, 1);
            result
        });
        node.status = match self.status {
            NodeStatus::Queued | NodeStatus::Running => NodeStatus::Idle,
            status => status,
        };
        node.error_message = self.error_message.clone();
        node.stale = self.stale;
        node
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::port::PortType;

    fn node(kind: NodeKind) -> Node {
        Node::new(
            NodeId::from_uuid(Uuid::from_u128(1)),
            "node",
            NodeParams::default_for(kind),
            Position::default(),
        )
    }

    #[test]
    fn new_node_is_idle_and_fresh() {
        let node = node(NodeKind::GenerateText);
        assert_eq!(node.status, NodeStatus::Idle);
        assert!(!node.stale);
        assert!(node.result.is_none());
        assert!(node.needs_run());
    }

    #[test]
    fn ports_follow_the_kind_template() {
        let node = node(NodeKind::TransformImage);
        let names: Vec<_> = node.input_ports().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["image", "in"]);
        assert_eq!(node.output_ports()[0].port_type, PortType::Image);
        assert_eq!(node.input_ports()[0].id, PortId::input(node.id, "image"));
        assert!(node.port(&PortId::output(node.id, "image")).is_some());
    }

    #[test]
    fn serialized_node_carries_its_type() {
        let node = node(NodeKind::GenerateMusic);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "generate_music");
        assert_eq!(value["params"]["type"], "generate_music");
        assert_eq!(value["status"], "idle");
    }
}
