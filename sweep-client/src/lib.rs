//! Sweep Generation Client
//!
//! Abstracts the external generative backend behind a single capability,
//! [`GenerationClient::generate`]. Which concrete backend serves a job is
//! decided once at startup through the [`ModelRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sweep_client::{GenerationRequest, MessagesClient, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MessagesClient::new("https://api.anthropic.com", "sk-..."));
//!     let registry = ModelRegistry::with_defaults(backend);
//!
//!     let entry = registry.resolve("haiku").expect("known alias");
//!     let request = GenerationRequest {
//!         model_id: entry.model_id.clone(),
//!         system: "You are terse.".to_string(),
//!         user: "Name one prime.".to_string(),
//!         max_tokens: 256,
//!     };
//!
//!     let generation = entry.client.generate(&request, Duration::from_secs(60)).await?;
//!     println!("{}", generation.text);
//!     Ok(())
//! }
//! ```

pub mod error;
mod messages;
mod registry;
pub mod testing;

pub use error::{GenerateError, Result};
pub use messages::MessagesClient;
pub use registry::{DEFAULT_MODELS, ModelEntry, ModelRegistry};

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use sweep_core::Usage;

/// One call to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Backend model id (already resolved from the alias)
    pub model_id: String,
    /// System prompt
    pub system: String,
    /// User message
    pub user: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

/// Text returned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Capability interface over a generative backend
///
/// `generate` is the only suspension point of a job: it blocks the calling
/// task until the backend answers or `timeout` elapses.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submits one request
    ///
    /// # Errors
    /// * [`GenerateError::Timeout`] if no response arrives within `timeout`
    /// * [`GenerateError::Backend`] if the backend rejects the request
    /// * [`GenerateError::Transient`] for retryable conditions
    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<Generation>;
}

/// Runs `future`, failing with [`GenerateError::Timeout`] once `timeout` elapses
pub async fn with_timeout<F>(timeout: Duration, future: F) -> Result<Generation>
where
    F: Future<Output = Result<Generation>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(GenerateError::Timeout(timeout)),
    }
}
