//! In-memory knowledge index with brute-force cosine similarity search.
//!
//! O(n) per query. Fine for a few thousand atoms; larger stores sit behind
//! their own `KnowledgeSearch` implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use wrench_core::error::WrenchError;
use wrench_provider::{Provider, ProviderError};

use crate::atom::{KnowledgeAtom, ScoredAtom};
use crate::backend::KnowledgeSearch;

/// Thread-safe atom index. Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    atoms: Arc<RwLock<HashMap<String, KnowledgeAtom>>>,
}

impl KnowledgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an atom by id.
    pub fn insert(&self, atom: KnowledgeAtom) -> Result<(), WrenchError> {
        let mut atoms = self
            .atoms
            .write()
            .map_err(|e| WrenchError::Storage(format!("Lock poisoned: {}", e)))?;
        atoms.insert(atom.id.clone(), atom);
        Ok(())
    }

    /// Remove an atom. Missing ids are not an error.
    pub fn remove(&self, id: &str) -> Result<(), WrenchError> {
        let mut atoms = self
            .atoms
            .write()
            .map_err(|e| WrenchError::Storage(format!("Lock poisoned: {}", e)))?;
        atoms.remove(id);
        Ok(())
    }

    /// The `k` atoms most similar to `query`, optionally restricted to one
    /// vendor (case-insensitive), sorted by [`ScoredAtom::rank`].
    pub fn search_atoms(
        &self,
        query: &[f32],
        vendor: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredAtom>, WrenchError> {
        let atoms = self
            .atoms
            .read()
            .map_err(|e| WrenchError::Storage(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<ScoredAtom> = atoms
            .values()
            .filter(|atom| vendor.map_or(true, |v| atom.vendor.eq_ignore_ascii_case(v)))
            .map(|atom| ScoredAtom {
                similarity: cosine_similarity(query, &atom.embedding),
                atom: atom.clone(),
            })
            .collect();

        scored.sort_by(ScoredAtom::rank);
        scored.truncate(k);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.atoms.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KnowledgeSearch for KnowledgeIndex {
    async fn search(
        &self,
        _provider: &Provider,
        vector: &[f32],
        vendor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredAtom>, ProviderError> {
        self.search_atoms(vector, vendor, limit)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
