//! Backend traits for embedding and vector search.
//!
//! Both receive the provider chosen by the failover executor so one
//! implementation can serve every provider of its chain (e.g. an HTTP client
//! that reads the endpoint and key from the provider).

use async_trait::async_trait;

use wrench_provider::{Provider, ProviderError};

use crate::atom::ScoredAtom;

/// Turns text into an embedding vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, provider: &Provider, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Similarity search over knowledge atoms.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Up to `limit` atoms closest to `vector`, restricted to `vendor` when
    /// given. Order is not significant; the retriever re-ranks.
    async fn search(
        &self,
        provider: &Provider,
        vector: &[f32],
        vendor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredAtom>, ProviderError>;
}
