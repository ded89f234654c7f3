//! Typed ports through which data enters and leaves nodes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::id::{NodeId, PortId};
use crate::media::MediaType;

/// Kind of data carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortType {
    Image,
    Text,
    Audio,
    Video,
    /// Accepts or produces any media.
    Any,
}

impl PortType {
    /// Returns whether data of this type can flow into a port of `other`.
    ///
    /// Types unify when they are equal or either side is [`PortType::Any`].
    pub fn unifies_with(self, other: PortType) -> bool {
        self == other || self == PortType::Any || other == PortType::Any
    }

    /// Returns whether media of the given type is accepted by this port.
    pub fn accepts(self, media_type: MediaType) -> bool {
        self.unifies_with(media_type.into())
    }
}

impl From<MediaType> for PortType {
    fn from(value: MediaType) -> Self {
        match value {
            MediaType::Image => Self::Image,
            MediaType::Text => Self::Text,
            MediaType::Audio => Self::Audio,
            MediaType::Video => Self::Video,
        }
    }
}

/// Direction of data flow through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

/// A typed attachment point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    pub port_type: PortType,
    pub direction: PortDirection,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl Port {
    /// Instantiates a port on `node_id` from a static template entry.
    pub fn from_spec(node_id: NodeId, direction: PortDirection, spec: &PortSpec) -> Self {
        Self {
            id: PortId::new(node_id, direction, spec.name),
            name: spec.name.to_owned(),
            port_type: spec.port_type,
            direction,
            required: spec.required,
            description: spec.description.to_owned(),
        }
    }

    /// Returns whether an edge from this port into `consumer` is well-typed.
    pub fn can_connect_to(&self, consumer: &Port) -> bool {
        self.direction == PortDirection::Output
            && consumer.direction == PortDirection::Input
            && self.port_type.unifies_with(consumer.port_type)
    }
}

/// Static description of a port in a node-kind template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub port_type: PortType,
    pub required: bool,
    pub description: &'static str,
}

impl PortSpec {
    pub(crate) const fn required(
        name: &'static str,
        port_type: PortType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            port_type,
            required: true,
            description,
        }
    }

    pub(crate) const fn optional(
        name: &'static str,
        port_type: PortType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            port_type,
            required: false,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_unifies_with_everything() {
        for port_type in [
            PortType::Image,
            PortType::Text,
            PortType::Audio,
            PortType::Video,
            PortType::Any,
        ] {
            assert!(PortType::Any.unifies_with(port_type));
            assert!(port_type.unifies_with(PortType::Any));
        }
    }

    #[test]
    fn distinct_concrete_types_do_not_unify() {
        assert!(!PortType::Text.unifies_with(PortType::Image));
        assert!(!PortType::Audio.unifies_with(PortType::Video));
        assert!(PortType::Image.unifies_with(PortType::Image));
    }

    #[test]
    fn ports_only_connect_output_to_input() {
        let node = NodeId::new();
        let spec = PortSpec::optional("in", PortType::Any, "");
        let input = Port::from_spec(node, PortDirection::Input, &spec);
        let output = Port::from_spec(node, PortDirection::Output, &spec);

        assert!(output.can_connect_to(&input));
        assert!(!input.can_connect_to(&output));
        assert!(!output.can_connect_to(&output));
    }
}
