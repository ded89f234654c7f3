//! Single node execution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use atelier_core::graph::Graph;
use atelier_core::media::MediaResult;
use atelier_core::node::{NodeKind, NodeParams};
use atelier_core::{GraphError, NodeId};
use atelier_service::generation::{GenerationRequest, GenerationService, ResolvedInput};
use atelier_service::{MediaStore, NoopEnricher, PromptEnricher};
use serde_json::Value;
use strum::IntoEnumIterator;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{KindConcurrency, TRACING_TARGET, prompt};
use crate::error::NodeError;

/// Parameter flags that opt a node into prompt enrichment.
const ENRICH_FLAGS: [&str; 2] = ["enrich", "human_edited"];

/// One semaphore per node kind, shared by all clones of an executor.
#[derive(Debug, Clone)]
struct KindPermits {
    semaphores: Arc<HashMap<NodeKind, Arc<Semaphore>>>,
}

impl KindPermits {
    fn new(limits: &KindConcurrency) -> Self {
        let semaphores = NodeKind::iter()
            .map(|kind| (kind, Arc::new(Semaphore::new(limits.limit(kind)))))
            .collect();
        Self {
            semaphores: Arc::new(semaphores),
        }
    }

    /// Waits for a free slot of the kind. The semaphores are never closed.
    async fn acquire(&self, kind: NodeKind) -> Option<OwnedSemaphorePermit> {
        let semaphore = self.semaphores.get(&kind)?.clone();
        semaphore.acquire_owned().await.ok()
    }
}

/// Runs exactly one node against the results produced so far.
///
/// The executor never retries; retry policy belongs to the generation
/// provider.
///
/// Generation calls are capped per node kind; a node waits for a free slot
/// of its kind before calling the provider.
#[derive(Clone)]
pub struct NodeExecutor {
    generation: GenerationService,
    media: Arc<dyn MediaStore>,
    enricher: Arc<dyn PromptEnricher>,
    permits: KindPermits,
    timeout: Duration,
}

impl fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeExecutor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl NodeExecutor {
    /// Creates a node executor with the default per-kind limits and no
    /// prompt enrichment.
    pub fn new(generation: GenerationService, media: Arc<dyn MediaStore>, timeout: Duration) -> Self {
        Self {
            generation,
            media,
            enricher: Arc::new(NoopEnricher),
            permits: KindPermits::new(&KindConcurrency::default()),
            timeout,
        }
    }

    /// Replaces the per-kind concurrency limits.
    pub fn with_kind_concurrency(mut self, limits: &KindConcurrency) -> Self {
        self.permits = KindPermits::new(limits);
        self
    }

    /// Sets the enricher consulted for nodes that opt into enrichment.
    pub fn with_enricher(mut self, enricher: Arc<dyn PromptEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    /// Executes a node and records the outcome on the graph.
    ///
    /// On success the node is completed with the new result and its
    /// descendants become stale. On failure the node is marked failed with
    /// the error message while its previous result is kept.
    pub async fn execute(
        &self,
        graph: &mut Graph,
        node_id: NodeId,
        results: &HashMap<NodeId, MediaResult>,
        canvas_memory: &str,
    ) -> Result<MediaResult, NodeError> {
        match self.generate(graph, node_id, results, canvas_memory).await {
            Ok(result) => {
                graph.record_success(node_id, result.clone())?;
                Ok(result)
            }
            Err(error) => {
                graph.record_failure(node_id, error.to_string())?;
                Err(error)
            }
        }
    }

    async fn generate(
        &self,
        graph: &Graph,
        node_id: NodeId,
        results: &HashMap<NodeId, MediaResult>,
        canvas_memory: &str,
    ) -> Result<MediaResult, NodeError> {
        let node = graph.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let kind = node.kind();
        let params = node.params().clone();

        let mut inputs = Vec::with_capacity(node.input_ports().len());
        for port in node.input_ports() {
            let upstream = graph
                .inbound_edge(node_id, &port.id)
                .and_then(|edge| Some((edge.from_node_id, results.get(&edge.from_node_id)?)));

            let resolved = match upstream {
                Some((source, result)) => self
                    .media
                    .get(&result.urls.original)
                    .await
                    .map_err(NodeError::Storage)?
                    .map(|data| ResolvedInput {
                        port: port.name.clone(),
                        source,
                        media_type: result.media_type,
                        data,
                    }),
                None => None,
            };

            match resolved {
                Some(input) => inputs.push(input),
                None if port.required => {
                    return Err(NodeError::MissingRequiredInput {
                        port: port.name.clone(),
                    });
                }
                None => {}
            }
        }

        let composed = prompt::compose(kind, params.prompt(), canvas_memory, &inputs);
        let (prompt, original_prompt) = self.enrich(composed, kind, &params).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            node_id = %node_id,
            kind = %kind,
            inputs = inputs.len(),
            "Executing node"
        );

        let request = GenerationRequest::new(node_id, params, prompt)
            .with_inputs(inputs)
            .with_timeout(self.timeout);

        let permit = self.permits.acquire(kind).await;
        let output = self
            .generation
            .generate(&request)
            .await
            .map_err(NodeError::Generation);
        drop(permit);
        let output = output?;

        let expected = kind.output_media_type();
        if output.media_type != expected {
            return Err(NodeError::UnexpectedOutput {
                expected,
                actual: output.media_type,
            });
        }

        let stored = self
            .media
            .put(node_id, &output)
            .await
            .map_err(NodeError::Storage)?;

        let result = MediaResult::new(
            output.media_type,
            stored.urls,
            request.prompt,
            stored.metadata,
            request.params,
        );
        Ok(match original_prompt {
            Some(original) => result.with_original_prompt(original),
            None => result,
        })
    }

    /// Returns the prompt to send and, when enrichment rewrote it, the
    /// composed prompt it replaced.
    async fn enrich(
        &self,
        composed: String,
        kind: NodeKind,
        params: &NodeParams,
    ) -> Result<(String, Option<String>), NodeError> {
        let extra = params.extra();
        let opted_in = ENRICH_FLAGS
            .iter()
            .any(|flag| extra.get(*flag) == Some(&Value::Bool(true)));
        if !opted_in {
            return Ok((composed, None));
        }

        let enriched = self
            .enricher
            .enrich(&composed, kind)
            .await
            .map_err(NodeError::Enrichment)?;
        if enriched == composed {
            return Ok((composed, None));
        }
        Ok((enriched, Some(composed)))
    }
}
