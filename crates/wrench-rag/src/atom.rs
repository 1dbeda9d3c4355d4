use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of maintenance knowledge (manual excerpt, fix procedure, FAQ).
///
/// Owned by the external knowledge store; the core only reads atoms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeAtom {
    pub id: String,
    /// Equipment vendor the atom applies to. Matched against the session
    /// vendor when filtering.
    pub vendor: String,
    pub embedding: Vec<f32>,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// An atom with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAtom {
    pub atom: KnowledgeAtom,
    pub similarity: f64,
}

impl ScoredAtom {
    /// Similarity descending; ties go to the most recently updated atom.
    pub fn rank(a: &ScoredAtom, b: &ScoredAtom) -> Ordering {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.atom.updated_at.cmp(&a.atom.updated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scored(id: &str, similarity: f64, age_days: i64) -> ScoredAtom {
        ScoredAtom {
            atom: KnowledgeAtom {
                id: id.to_string(),
                vendor: "daikin".to_string(),
                embedding: vec![],
                content: String::new(),
                updated_at: Utc::now() - Duration::days(age_days),
            },
            similarity,
        }
    }

    #[test]
    fn test_rank_by_similarity_then_recency() {
        let mut atoms = vec![
            scored("old-tie", 0.8, 30),
            scored("low", 0.5, 0),
            scored("top", 0.9, 100),
            scored("new-tie", 0.8, 1),
        ];
        atoms.sort_by(ScoredAtom::rank);
        let ids: Vec<&str> = atoms.iter().map(|s| s.atom.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "new-tie", "old-tie", "low"]);
    }
}
