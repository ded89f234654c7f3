//! Runtime error types.

use atelier_core::media::MediaType;
use atelier_core::{BatchId, ExecutionId, GraphError, GraphId};
use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors returned to callers of the canvas and the executors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Structural error raised by the graph model.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// No graph exists with the given id.
    #[error("graph {0} not found")]
    GraphNotFound(GraphId),

    /// No execution exists with the given id.
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    /// No batch exists with the given id.
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    /// The graph already has an execution in flight.
    #[error("graph {0} is already running")]
    AlreadyRunning(GraphId),

    /// The event stream of a run was already taken.
    #[error("events of run {0} already have a subscriber")]
    AlreadySubscribed(String),

    /// A collaborator failed.
    #[error(transparent)]
    Service(#[from] atelier_service::Error),
}

/// Failure of a single node run.
///
/// Reported through `node_failed` events and the node's `error_message`,
/// never raised across the event stream.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A required input port has no edge or no upstream result.
    #[error("missing required input `{port}`")]
    MissingRequiredInput {
        /// Name of the unresolved input port.
        port: String,
    },

    /// The generation capability failed.
    #[error("generation failed: {0}")]
    Generation(#[source] atelier_service::Error),

    /// The prompt enricher failed.
    #[error("prompt enrichment failed: {0}")]
    Enrichment(#[source] atelier_service::Error),

    /// Upstream media could not be read or the output could not be stored.
    #[error("storage failed: {0}")]
    Storage(#[source] atelier_service::Error),

    /// The generation capability returned media of the wrong type.
    #[error("expected {expected} output, got {actual}")]
    UnexpectedOutput {
        /// Media type the node kind produces.
        expected: MediaType,
        /// Media type that was returned.
        actual: MediaType,
    },

    /// The node vanished from the graph while running.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl NodeError {
    /// Returns whether retrying the node later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Generation(error) | Self::Enrichment(error) | Self::Storage(error) => {
                error.is_transient()
            }
            _ => false,
        }
    }
}
