//! Media generation abstractions.
//!
//! The engine treats generation as an opaque, potentially slow capability
//! that takes a typed request and returns typed media or fails:
//!
//! ```rust,ignore
//! use atelier_service::generation::{GenerationRequest, GenerationService};
//!
//! let service = GenerationService::from_provider(my_provider);
//! let output = service.generate(&request).await?;
//! ```

#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
mod mock;
mod request;
mod response;
mod service;

#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub use mock::{MockConfig, MockProvider};
pub use request::{GenerationRequest, ResolvedInput};
pub use response::MediaOutput;
pub use service::GenerationService;

pub use crate::{Error, Result};

/// Tracing target for generation operations.
pub const TRACING_TARGET: &str = "atelier_service::generation";

/// A backend able to produce media for any node kind.
///
/// Implementations dispatch on [`GenerationRequest::kind`]. Errors should use
/// a transient [`ErrorKind`] when a later retry may succeed; the engine
/// itself never retries.
///
/// [`ErrorKind`]: crate::ErrorKind
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generates media for a single node.
    async fn generate(&self, request: &GenerationRequest) -> Result<MediaOutput>;
}
