//! Execution events and run status.
//!
//! A graph run reports its progress as [`RunEvent`]s. Single executions wrap
//! them into [`ExecutionEvent`]s, batches into [`BatchExecutionEvent`]s
//! tagged with the member graph. Both envelopes are wire-stable: the event
//! type serializes in snake_case and absent fields are omitted.

use atelier_core::media::{MediaType, MediaUrls};
use atelier_core::{BatchId, ExecutionId, GraphId, NodeId};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString, IntoStaticStr};

/// Reason attached to `node_skipped` batch events.
pub const SKIP_REASON: &str = "already completed";

/// Lifecycle state of an execution or a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Returns whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Progress of a single graph run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started,
    NodeStarted {
        node_id: NodeId,
    },
    /// The node was up to date and reused its previous result.
    NodeSkipped {
        node_id: NodeId,
    },
    NodeCompleted {
        node_id: NodeId,
        media_type: MediaType,
        urls: MediaUrls,
    },
    NodeFailed {
        node_id: NodeId,
        error: String,
    },
    Completed,
    Failed {
        node_id: Option<NodeId>,
        error: String,
    },
    Cancelled,
}

impl RunEvent {
    /// Wraps the event for subscribers of a single execution.
    ///
    /// Skipped nodes are not reported to execution subscribers.
    pub fn into_execution_event(self, execution_id: ExecutionId) -> Option<ExecutionEvent> {
        use ExecutionEventType as Type;

        let event = match self {
            Self::Started => ExecutionEvent::new(execution_id, Type::Started),
            Self::NodeStarted { node_id } => {
                ExecutionEvent::new(execution_id, Type::NodeStarted).with_node(node_id)
            }
            Self::NodeSkipped { .. } => return None,
            Self::NodeCompleted {
                node_id,
                media_type,
                urls,
            } => ExecutionEvent::new(execution_id, Type::NodeCompleted)
                .with_node(node_id)
                .with_data(completed_data(media_type, &urls)),
            Self::NodeFailed { node_id, error } => {
                ExecutionEvent::new(execution_id, Type::NodeFailed)
                    .with_node(node_id)
                    .with_data(json!({ "error": error }))
            }
            Self::Completed => ExecutionEvent::new(execution_id, Type::Completed),
            Self::Failed { node_id, error } => ExecutionEvent::new(execution_id, Type::Failed)
                .with_data(failed_data(node_id, error)),
            Self::Cancelled => ExecutionEvent::new(execution_id, Type::Cancelled),
        };
        Some(event)
    }

    /// Tags a node event with its batch and graph.
    ///
    /// Run-level events are not forwarded; the batch reports the outcome of
    /// each member graph itself.
    pub fn into_batch_event(self, batch_id: BatchId, graph_id: GraphId) -> Option<BatchExecutionEvent> {
        use BatchEventType as Type;

        let event = match self {
            Self::NodeStarted { node_id } => BatchExecutionEvent::new(batch_id, Type::NodeStarted)
                .with_graph(graph_id)
                .with_node(node_id),
            Self::NodeSkipped { node_id } => BatchExecutionEvent::new(batch_id, Type::NodeSkipped)
                .with_graph(graph_id)
                .with_node(node_id)
                .with_data(json!({ "reason": SKIP_REASON })),
            Self::NodeCompleted {
                node_id,
                media_type,
                urls,
            } => BatchExecutionEvent::new(batch_id, Type::NodeCompleted)
                .with_graph(graph_id)
                .with_node(node_id)
                .with_data(completed_data(media_type, &urls)),
            Self::NodeFailed { node_id, error } => {
                BatchExecutionEvent::new(batch_id, Type::NodeFailed)
                    .with_graph(graph_id)
                    .with_node(node_id)
                    .with_data(json!({ "error": error }))
            }
            Self::Started | Self::Completed | Self::Failed { .. } | Self::Cancelled => return None,
        };
        Some(event)
    }
}

/// Payload of a run failure; `node_id` is only present when a node caused it.
fn failed_data(node_id: Option<NodeId>, error: String) -> Value {
    let mut data = Map::new();
    data.insert("error".into(), Value::String(error));
    if let Some(node_id) = node_id {
        data.insert("node_id".into(), Value::String(node_id.to_string()));
    }
    Value::Object(data)
}

fn completed_data(media_type: MediaType, urls: &MediaUrls) -> Value {
    json!({
        "media_type": media_type,
        "urls": urls,
    })
}

/// Type of an [`ExecutionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionEventType {
    Started,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionEventType {
    /// Returns whether the event ends the execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Progress event of a single graph execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: ExecutionId,
    pub event_type: ExecutionEventType,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ExecutionEvent {
    /// Creates an event stamped with the current time.
    pub fn new(execution_id: ExecutionId, event_type: ExecutionEventType) -> Self {
        Self {
            execution_id,
            event_type,
            timestamp: Timestamp::now(),
            node_id: None,
            data: None,
        }
    }

    /// Attaches the node the event is about.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Attaches the event payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Type of a [`BatchExecutionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchEventType {
    BatchStarted,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    NodeSkipped,
    GraphCompleted,
    GraphFailed,
    BatchCompleted,
    BatchFailed,
    BatchCancelled,
}

impl BatchEventType {
    /// Returns whether the event ends the batch.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::BatchCompleted | Self::BatchFailed | Self::BatchCancelled
        )
    }
}

/// Progress event of a batch, optionally tagged with a member graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExecutionEvent {
    pub batch_id: BatchId,
    pub event_type: BatchEventType,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<GraphId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl BatchExecutionEvent {
    /// Creates an event stamped with the current time.
    pub fn new(batch_id: BatchId, event_type: BatchEventType) -> Self {
        Self {
            batch_id,
            event_type,
            timestamp: Timestamp::now(),
            graph_id: None,
            node_id: None,
            data: None,
        }
    }

    /// Attaches the member graph the event is about.
    pub fn with_graph(mut self, graph_id: GraphId) -> Self {
        self.graph_id = Some(graph_id);
        self
    }

    /// Attaches the node the event is about.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Attaches the event payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_events_omit_absent_fields() {
        let execution_id = ExecutionId::new();
        let event = RunEvent::Started
            .into_execution_event(execution_id)
            .unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event_type"], "started");
        assert_eq!(value["execution_id"], execution_id.to_string());
        assert!(value.get("node_id").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn node_completed_carries_media_type_and_urls() {
        let node_id = NodeId::new();
        let event = RunEvent::NodeCompleted {
            node_id,
            media_type: MediaType::Image,
            urls: MediaUrls::same("/media/a/b/original.png"),
        }
        .into_execution_event(ExecutionId::new())
        .unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event_type"], "node_completed");
        assert_eq!(value["node_id"], node_id.to_string());
        assert_eq!(value["data"]["media_type"], "image");
        assert_eq!(value["data"]["urls"]["original"], "/media/a/b/original.png");
        assert_eq!(value["data"]["urls"]["thumbnail"], "/media/a/b/original.png");
    }

    #[test]
    fn run_failure_names_the_node_only_when_known() {
        let execution_id = ExecutionId::new();
        let node_id = NodeId::new();

        let event = RunEvent::Failed {
            node_id: Some(node_id),
            error: "generation failed".into(),
        }
        .into_execution_event(execution_id)
        .unwrap();
        assert_eq!(
            event.data,
            Some(json!({ "error": "generation failed", "node_id": node_id.to_string() }))
        );

        let event = RunEvent::Failed {
            node_id: None,
            error: "failed to save graph".into(),
        }
        .into_execution_event(execution_id)
        .unwrap();
        assert_eq!(event.data, Some(json!({ "error": "failed to save graph" })));
    }

    #[test]
    fn skipped_nodes_are_only_reported_to_batches() {
        let node_id = NodeId::new();
        let graph_id = GraphId::new();
        let skipped = RunEvent::NodeSkipped { node_id };

        assert!(skipped.clone().into_execution_event(ExecutionId::new()).is_none());

        let event = skipped.into_batch_event(BatchId::new(), graph_id).unwrap();
        assert_eq!(event.event_type, BatchEventType::NodeSkipped);
        assert_eq!(event.graph_id, Some(graph_id));
        assert_eq!(event.data, Some(json!({ "reason": SKIP_REASON })));
    }

    #[test]
    fn run_level_events_stay_out_of_batches() {
        let batch_id = BatchId::new();
        let graph_id = GraphId::new();
        assert!(RunEvent::Started.into_batch_event(batch_id, graph_id).is_none());
        assert!(RunEvent::Completed.into_batch_event(batch_id, graph_id).is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(ExecutionEventType::Failed.is_terminal());
        assert!(!ExecutionEventType::NodeFailed.is_terminal());
        assert!(BatchEventType::BatchCompleted.is_terminal());
        assert!(!BatchEventType::GraphCompleted.is_terminal());
        assert_eq!(
            serde_json::to_value(BatchEventType::BatchCancelled).unwrap(),
            "batch_cancelled"
        );
    }
}
