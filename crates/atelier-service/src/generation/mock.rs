//! Mock generation provider for testing.
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! atelier-service = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_service::generation::{GenerationService, MockConfig, MockProvider};
//!
//! // Prompts mentioning "explode" fail, everything else succeeds.
//! let config = MockConfig {
//!     fail_on: vec!["explode".into()],
//!     ..Default::default()
//! };
//! let service = GenerationService::mock_with_config(config);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use atelier_core::media::{MediaMetadata, MediaType};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use super::{GenerationProvider, GenerationRequest, GenerationService, MediaOutput};
use crate::{Error, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const MP4_SIGNATURE: &[u8] = b"\x00\x00\x00\x18ftypmp42";
const WAV_SIGNATURE: &[u8] = b"RIFF\x00\x00\x00\x00WAVE";

/// Configuration for the mock provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct MockConfig {
    /// Text to return for text-producing nodes.
    #[cfg_attr(feature = "config", arg(long = "mock-text", env = "MOCK_TEXT"))]
    #[serde(default)]
    pub mock_text: Option<String>,

    /// Artificial latency added to every call, in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "mock-latency-ms", env = "MOCK_LATENCY_MS", default_value = "0")
    )]
    #[serde(default)]
    pub latency_ms: u64,

    /// Calls whose prompt contains any of these markers fail permanently.
    #[cfg_attr(
        feature = "config",
        arg(long = "mock-fail-on", env = "MOCK_FAIL_ON", value_delimiter = ',')
    )]
    #[serde(default)]
    pub fail_on: Vec<String>,
}

impl MockConfig {
    /// Convert this configuration into a generation service.
    pub fn into_service(self) -> GenerationService {
        GenerationService::from_provider(MockProvider::new(self))
    }
}

/// Mock provider producing deterministic placeholder media.
///
/// Every request is recorded so tests can inspect what the engine sent,
/// along with the highest number of calls that were in flight at once.
#[derive(Clone, Debug, Default)]
pub struct MockProvider {
    config: Arc<MockConfig>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Creates a new mock provider with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..Default::default()
        }
    }

    /// Creates a new mock provider that fails prompts containing `marker`.
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self::new(MockConfig {
            fail_on: vec![marker.into()],
            ..Default::default()
        })
    }

    /// Returns every request received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the highest number of calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Convert this provider into a generation service.
    ///
    /// The provider stays usable for inspection since clones share state.
    pub fn into_service(self) -> GenerationService {
        GenerationService::from_provider(self)
    }

    fn placeholder(signature: &[u8], prompt: &str) -> Vec<u8> {
        let mut data = signature.to_vec();
        data.extend_from_slice(prompt.as_bytes());
        data
    }
}

#[async_trait::async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<MediaOutput> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = self
            .config
            .fail_on
            .iter()
            .find(|marker| request.prompt.contains(marker.as_str()))
        {
            return Err(Error::generation_failed()
                .with_message(format!("mock failure triggered by `{marker}`")));
        }

        let output = match request.kind.output_media_type() {
            MediaType::Text => MediaOutput::text(
                self.config
                    .mock_text
                    .clone()
                    .unwrap_or_else(|| format!("{}: {}", request.kind, request.prompt)),
            ),
            MediaType::Image => MediaOutput::new(
                MediaType::Image,
                Self::placeholder(PNG_SIGNATURE, &request.prompt),
                "png",
            )
            .with_metadata(MediaMetadata {
                width: Some(1024),
                height: Some(1024),
                ..Default::default()
            }),
            MediaType::Video => MediaOutput::new(
                MediaType::Video,
                Self::placeholder(MP4_SIGNATURE, &request.prompt),
                "mp4",
            )
            .with_metadata(MediaMetadata {
                duration_secs: Some(8.0),
                ..Default::default()
            }),
            MediaType::Audio => MediaOutput::new(
                MediaType::Audio,
                Self::placeholder(WAV_SIGNATURE, &request.prompt),
                "wav",
            ),
        };

        Ok(output)
    }
}
