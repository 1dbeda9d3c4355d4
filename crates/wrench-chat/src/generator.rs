//! Text generation seam.
//!
//! The router only sees [`Generator`]. [`DialectGenerator`] builds one from a
//! raw transport by parsing each payload with the adapter of the provider's
//! configured dialect.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use wrench_provider::{adapter_for, Completion, ParseOutcome, Provider, ProviderError};

/// A prompt for one generative call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Persona and task instructions.
    pub system: String,
    /// Knowledge, conversation and the user's question.
    pub prompt: String,
    pub max_tokens: u32,
}

/// Produces a completion from one provider of the generation chain.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        provider: &Provider,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError>;
}

/// Sends a request to a provider and returns the raw response body.
///
/// Implementations map HTTP failures with [`ProviderError::from_status`].
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(
        &self,
        provider: &Provider,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError>;
}

/// [`Generator`] over a raw transport, normalizing payloads per dialect.
pub struct DialectGenerator<T> {
    transport: T,
}

impl<T: CompletionTransport> DialectGenerator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: CompletionTransport> Generator for DialectGenerator<T> {
    async fn generate(
        &self,
        provider: &Provider,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError> {
        let raw = self.transport.send(provider, request).await?;
        let outcome = adapter_for(provider.dialect).parse(&raw);
        if let ParseOutcome::Malformed { ref reason, ref raw } = outcome {
            warn!(
                provider = %provider.id,
                dialect = ?provider.dialect,
                reason = %reason,
                raw_len = raw.len(),
                "Malformed completion payload"
            );
        }
        outcome.into_result()
    }
}
