//! AI client trait and metadata definitions.

pub mod error;
pub mod generator;
pub mod openai;
pub mod prompts;
pub mod registry;
pub mod retry;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_utils;

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

pub use error::{ErrorKind, ProviderError};
pub use generator::{ConsentGate, GenerationContext, MessageGenerator};
pub use registry::{ProviderSpec, PROVIDERS};
pub use retry::RetryConfig;

/// Metadata about an AI client implementation.
#[derive(Clone, Debug)]
pub struct AiClientMetadata {
    /// Service provider display name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Whether requests leave the local machine.
    pub remote: bool,
}

/// Trait for AI service clients.
///
/// Implementations only move text; prompt construction, redaction and
/// retries happen in [`MessageGenerator`].
pub trait AiClient: Send + Sync {
    /// Send a request to the AI service and return the raw response.
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Get metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}
