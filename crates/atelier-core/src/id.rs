//! Identifier types.

use std::str::FromStr;

use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::port::PortDirection;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[derive(Debug, Display, From, Into)]
        #[debug("{_0}")]
        #[display("{_0}")]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier.
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an identifier from an existing UUID.
            #[inline]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[inline]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s)?))
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a canvas graph.
    GraphId
);

uuid_id!(
    /// Unique identifier for a node within a graph.
    NodeId
);

uuid_id!(
    /// Unique identifier for an edge within a graph.
    EdgeId
);

uuid_id!(
    /// Unique identifier for a generated media result.
    MediaId
);

uuid_id!(
    /// Unique identifier for a single graph execution.
    ExecutionId
);

uuid_id!(
    /// Unique identifier for a batch of graph executions.
    BatchId
);

/// Identifier of a port, derived from its node, direction and name.
///
/// Formatted as `{node_id}_{direction}_{name}`, e.g.
/// `0192...-..._input_image`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct PortId(String);

impl PortId {
    /// Builds the identifier of a port on the given node.
    pub fn new(node_id: NodeId, direction: PortDirection, name: &str) -> Self {
        Self(format!("{node_id}_{direction}_{name}"))
    }

    /// Builds the identifier of an input port.
    #[inline]
    pub fn input(node_id: NodeId, name: &str) -> Self {
        Self::new(node_id, PortDirection::Input, name)
    }

    /// Builds the identifier of an output port.
    #[inline]
    pub fn output(node_id: NodeId, name: &str) -> Self {
        Self::new(node_id, PortDirection::Output, name)
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for PortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
