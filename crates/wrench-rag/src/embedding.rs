//! Hashing embedding backend.
//!
//! `HashEmbedding` maps each lowercase word to a fixed bucket of a
//! 384-dimensional vector (the feature-hashing trick). Texts that share words
//! get a positive cosine similarity, which is enough for offline use and
//! tests without a model server.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use wrench_provider::{Provider, ProviderError};

use crate::backend::EmbeddingBackend;

/// Default dimensionality, matching common sentence-transformer models.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic feature-hashing embedding.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed synchronously. Returns `None` for text without any word.
    pub fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        let mut result = vec![0.0f32; self.dimensions];
        let mut words = 0usize;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
            words += 1;
        }

        if words == 0 {
            return None;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        Some(result)
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbedding {
    async fn embed(&self, _provider: &Provider, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_text(text)
            .ok_or_else(|| ProviderError::Rejected("cannot embed text without words".to_string()))
    }
}
