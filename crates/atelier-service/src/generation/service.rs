//! Generation service with deadlines and observability.

use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;

use super::{GenerationProvider, GenerationRequest, MediaOutput, TRACING_TARGET};
use crate::{Error, Result};

/// Generation service with deadline enforcement and structured logging.
///
/// Wraps any [`GenerationProvider`]. When a request carries a timeout, the
/// provider call is abandoned once it elapses and a transient
/// [`ErrorKind::Timeout`] error is returned.
///
/// [`ErrorKind::Timeout`]: crate::ErrorKind::Timeout
#[derive(Clone)]
pub struct GenerationService {
    provider: Arc<dyn GenerationProvider>,
}

impl fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationService").finish_non_exhaustive()
    }
}

impl GenerationService {
    /// Creates a new generation service from a provider.
    pub fn from_provider<P>(provider: P) -> Self
    where
        P: GenerationProvider + 'static,
    {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Creates a new generation service from a shared provider.
    pub fn from_arc(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// Generates media for a single node.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<MediaOutput> {
        let started_at = Timestamp::now();

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            node_id = %request.node_id,
            kind = %request.kind,
            inputs = request.inputs.len(),
            prompt_length = request.prompt.len(),
            "Processing generation request"
        );

        let call = self.provider.generate(request);
        let result = match request.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout().with_message(format!(
                    "generation exceeded {}s",
                    timeout.as_secs_f64()
                ))),
            },
            None => call.await,
        };
        let elapsed = Timestamp::now().duration_since(started_at);

        match &result {
            Ok(output) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    media_type = %output.media_type,
                    size_bytes = output.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "Generation successful"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    error = %error,
                    transient = error.is_transient(),
                    elapsed_ms = elapsed.as_millis(),
                    "Generation failed"
                );
            }
        }

        result
    }

    /// Create a mock generation service for testing.
    #[cfg(feature = "test-utils")]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
    pub fn mock() -> Self {
        Self::from_provider(super::MockProvider::default())
    }

    /// Create a mock generation service with custom configuration.
    #[cfg(feature = "test-utils")]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
    pub fn mock_with_config(config: super::MockConfig) -> Self {
        Self::from_provider(super::MockProvider::new(config))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use atelier_core::NodeId;
    use atelier_core::node::{NodeKind, NodeParams};

    use super::*;
    use crate::ErrorKind;

    struct SlowProvider;

    #[async_trait::async_trait]
    impl GenerationProvider for SlowProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<MediaOutput> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(MediaOutput::text("late"))
        }
    }

    struct EchoProvider;

    #[async_trait::async_trait]
    impl GenerationProvider for EchoProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<MediaOutput> {
            Ok(MediaOutput::text(request.prompt.clone()))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            NodeId::new(),
            NodeParams::default_for(NodeKind::GenerateText),
            "hello",
        )
    }

    #[tokio::test]
    async fn deadline_maps_to_transient_timeout() {
        let service = GenerationService::from_provider(SlowProvider);
        let request = request().with_timeout(Duration::from_millis(50));

        let error = service.generate(&request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn provider_output_passes_through() {
        let service = GenerationService::from_provider(EchoProvider);
        let output = service.generate(&request()).await.unwrap();
        assert_eq!(&output.data[..], b"hello");
    }
}
