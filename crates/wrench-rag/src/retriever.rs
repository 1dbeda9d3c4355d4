//! Retrieval-augmented query pipeline.
//!
//! 1. Prepend a bounded summary of recent turns to the user query
//! 2. Embed the augmented text through the embedding chain
//! 3. Search through the knowledge chain, filtered by vendor
//! 4. Drop matches under the similarity floor, rank, keep `k`

use std::sync::Arc;

use tracing::debug;

use wrench_core::config::RetrievalConfig;
use wrench_core::types::{ChainId, ChatMessage, MessageRole};
use wrench_provider::FailoverExecutor;

use crate::atom::ScoredAtom;
use crate::backend::{EmbeddingBackend, KnowledgeSearch};
use crate::error::RetrievalError;

/// Retrieves knowledge atoms for a user query.
pub struct RagRetriever {
    executor: Arc<FailoverExecutor>,
    embedder: Arc<dyn EmbeddingBackend>,
    search: Arc<dyn KnowledgeSearch>,
    embed_chain: ChainId,
    search_chain: ChainId,
    config: RetrievalConfig,
}

impl RagRetriever {
    pub fn new(
        executor: Arc<FailoverExecutor>,
        embedder: Arc<dyn EmbeddingBackend>,
        search: Arc<dyn KnowledgeSearch>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            executor,
            embedder,
            search,
            embed_chain: ChainId::new(config.embed_chain.as_str()),
            search_chain: ChainId::new(config.search_chain.as_str()),
            config,
        }
    }

    /// Configured default for `k`.
    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    /// Atoms relevant to `query`, best first.
    ///
    /// An empty result means nothing cleared the similarity floor; it is not
    /// an error. Chain failures surface as `Embedding` or `Search`.
    pub async fn retrieve(
        &self,
        query: &str,
        vendor: Option<&str>,
        history: &[ChatMessage],
        k: usize,
    ) -> Result<Vec<ScoredAtom>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let augmented = augment_query(
            query,
            history,
            self.config.summary_turns,
            self.config.summary_chars,
        );
        let text = augmented.as_str();
        let embedder = &self.embedder;

        let vector = self
            .executor
            .execute(&self.embed_chain, |provider| async move {
                embedder.embed(&provider, text).await
            })
            .await
            .map_err(RetrievalError::Embedding)?
            .value;

        let search = &self.search;
        let query_vector = vector.as_slice();
        let mut matches = self
            .executor
            .execute(&self.search_chain, |provider| async move {
                search.search(&provider, query_vector, vendor, k).await
            })
            .await
            .map_err(RetrievalError::Search)?
            .value;

        let returned = matches.len();
        let floor = self.config.min_similarity;
        matches.retain(|m| m.similarity >= floor);
        matches.sort_by(ScoredAtom::rank);
        matches.truncate(k);

        debug!(
            vendor = vendor.unwrap_or("*"),
            returned,
            kept = matches.len(),
            floor,
            top = matches.first().map(|m| m.similarity).unwrap_or(0.0),
            "Knowledge retrieved"
        );
        Ok(matches)
    }
}

/// Prepend a bounded summary of the last `turns` non-system messages to the
/// query. The summary never exceeds `max_chars` characters.
pub fn augment_query(query: &str, history: &[ChatMessage], turns: usize, max_chars: usize) -> String {
    let query = query.trim();
    if turns == 0 || max_chars == 0 {
        return query.to_string();
    }

    let recent: Vec<&ChatMessage> = history
        .iter()
        .filter(|m| m.role != MessageRole::System && !m.content.trim().is_empty())
        .collect();
    let start = recent.len().saturating_sub(turns);
    let per_turn = (max_chars / turns).max(1);

    let parts: Vec<String> = recent[start..]
        .iter()
        .map(|m| {
            let collapsed = m.content.split_whitespace().collect::<Vec<_>>().join(" ");
            truncate_chars(&collapsed, per_turn)
        })
        .collect();

    if parts.is_empty() {
        return query.to_string();
    }

    let summary = truncate_chars(&parts.join(" | "), max_chars);
    format!("{}\n{}", summary, query)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use wrench_core::config::{HealthConfig, ProviderConfig};
    use wrench_core::events::MemoryNotifier;
    use wrench_core::types::ProviderKind;
    use wrench_provider::{
        FailoverError, HealthMonitor, Provider, ProviderError, ProviderRegistry,
    };

    use crate::atom::KnowledgeAtom;

    // ---- fixtures ----

    #[derive(Default)]
    struct RecordingEmbedder {
        texts: Mutex<Vec<String>>,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl EmbeddingBackend for RecordingEmbedder {
        async fn embed(&self, provider: &Provider, text: &str) -> Result<Vec<f32>, ProviderError> {
            if self.fail_for == Some(provider.id.as_str()) || self.fail_for == Some("*") {
                return Err(ProviderError::Unavailable("embedding host down".into()));
            }
            self.texts.lock().unwrap().push(text.to_string());
            Ok(vec![1.0, 0.0])
        }
    }

    struct StaticSearch {
        results: Vec<ScoredAtom>,
        calls: Mutex<Vec<(Option<String>, usize)>>,
    }

    impl StaticSearch {
        fn new(results: Vec<ScoredAtom>) -> Self {
            Self {
                results,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl KnowledgeSearch for StaticSearch {
        async fn search(
            &self,
            _provider: &Provider,
            _vector: &[f32],
            vendor: Option<&str>,
            limit: usize,
        ) -> Result<Vec<ScoredAtom>, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((vendor.map(str::to_string), limit));
            Ok(self.results.clone())
        }
    }

    fn scored(id: &str, similarity: f64, age_days: i64) -> ScoredAtom {
        ScoredAtom {
            atom: KnowledgeAtom {
                id: id.to_string(),
                vendor: "daikin".to_string(),
                embedding: vec![1.0, 0.0],
                content: format!("content {}", id),
                updated_at: Utc::now() - Duration::days(age_days),
            },
            similarity,
        }
    }

    fn message(role: MessageRole, seq: u64, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            seq,
            role,
            content: content.to_string(),
            confidence: None,
            atoms_used: vec![],
            created_at: Utc::now(),
        }
    }

    fn executor() -> Arc<FailoverExecutor> {
        let providers = vec![
            ProviderConfig::new("embed-a", "embedding", ProviderKind::Llm, "emb_aaaaBBBBccccDDDD", 1),
            ProviderConfig::new("embed-b", "embedding", ProviderKind::Llm, "emb_eeeeFFFFggggHHHH", 2),
            ProviderConfig::new(
                "pgvector",
                "knowledge",
                ProviderKind::Database,
                "postgres://rag:pw@vectors.example.com/kb",
                1,
            ),
        ];
        let registry = Arc::new(ProviderRegistry::from_config(&providers).unwrap());
        let notifier = Arc::new(MemoryNotifier::new());
        let health = Arc::new(HealthMonitor::new(&HealthConfig::default(), notifier.clone()));
        Arc::new(FailoverExecutor::new(registry, health, notifier))
    }

    fn retriever(
        embedder: Arc<RecordingEmbedder>,
        search: Arc<StaticSearch>,
    ) -> RagRetriever {
        RagRetriever::new(executor(), embedder, search, RetrievalConfig::default())
    }

    // ---- retrieve ----

    #[tokio::test]
    async fn test_ranked_floored_and_truncated() {
        let search = Arc::new(StaticSearch::new(vec![
            scored("low", 0.2, 0),
            scored("old-tie", 0.8, 40),
            scored("top", 0.92, 3),
            scored("new-tie", 0.8, 1),
            scored("mid", 0.5, 0),
        ]));
        let r = retriever(Arc::new(RecordingEmbedder::default()), search);

        let hits = r.retrieve("E5 fault", Some("daikin"), &[], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.atom.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "new-tie", "old-tie"]);
    }

    #[tokio::test]
    async fn test_nothing_above_floor_is_empty_not_error() {
        let search = Arc::new(StaticSearch::new(vec![scored("a", 0.1, 0), scored("b", 0.3, 0)]));
        let r = retriever(Arc::new(RecordingEmbedder::default()), search);
        let hits = r.retrieve("anything", None, &[], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_vendor_filter_and_limit_reach_search() {
        let search = Arc::new(StaticSearch::new(vec![]));
        let r = retriever(Arc::new(RecordingEmbedder::default()), search.clone());
        r.retrieve("no cooling", Some("mitsubishi"), &[], r.top_k())
            .await
            .unwrap();
        assert_eq!(
            *search.calls.lock().unwrap(),
            vec![(Some("mitsubishi".to_string()), 5)]
        );
    }

    #[tokio::test]
    async fn test_history_summary_is_embedded() {
        let embedder = Arc::new(RecordingEmbedder::default());
        let r = retriever(embedder.clone(), Arc::new(StaticSearch::new(vec![])));
        let history = vec![
            message(MessageRole::System, 1, "You are Wrench."),
            message(MessageRole::User, 2, "My Daikin FTXM35 shows a fault."),
            message(MessageRole::Assistant, 3, "Which code is on the display?"),
        ];
        r.retrieve("It says E5", None, &history, 5).await.unwrap();

        let texts = embedder.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].ends_with("\nIt says E5"));
        assert!(texts[0].contains("FTXM35"));
        assert!(!texts[0].contains("You are Wrench"));
    }

    #[tokio::test]
    async fn test_embedding_fails_over_within_chain() {
        let embedder = Arc::new(RecordingEmbedder {
            texts: Mutex::new(Vec::new()),
            fail_for: Some("embed-a"),
        });
        let search = Arc::new(StaticSearch::new(vec![scored("a", 0.9, 0)]));
        let r = retriever(embedder, search);
        let hits = r.retrieve("query", None, &[], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_chain_exhausted() {
        let embedder = Arc::new(RecordingEmbedder {
            texts: Mutex::new(Vec::new()),
            fail_for: Some("*"),
        });
        let search = Arc::new(StaticSearch::new(vec![]));
        let r = retriever(embedder, search.clone());
        let err = r.retrieve("query", None, &[], 5).await.unwrap_err();
        match err {
            RetrievalError::Embedding(FailoverError::ChainExhausted { attempts, .. }) => {
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(search.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let r = retriever(
            Arc::new(RecordingEmbedder::default()),
            Arc::new(StaticSearch::new(vec![])),
        );
        assert!(matches!(
            r.retrieve("   ", None, &[], 5).await,
            Err(RetrievalError::EmptyQuery)
        ));
    }

    // ---- augment_query ----

    #[test]
    fn test_augment_without_history() {
        assert_eq!(augment_query("  E5 fault ", &[], 3, 240), "E5 fault");
    }

    #[test]
    fn test_augment_keeps_last_turns_only() {
        let history = vec![
            message(MessageRole::User, 1, "first"),
            message(MessageRole::Assistant, 2, "second"),
            message(MessageRole::User, 3, "third"),
        ];
        assert_eq!(
            augment_query("q", &history, 2, 240),
            "second | third\nq"
        );
    }

    #[test]
    fn test_augment_is_bounded() {
        let long = "x".repeat(1_000);
        let history = vec![
            message(MessageRole::User, 1, &long),
            message(MessageRole::Assistant, 2, &long),
        ];
        let out = augment_query("query", &history, 2, 100);
        let summary = out.split('\n').next().unwrap();
        assert!(summary.chars().count() <= 100);
        assert!(out.ends_with("\nquery"));
    }
}
