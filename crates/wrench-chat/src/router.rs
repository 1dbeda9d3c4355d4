//! Confidence routing.
//!
//! Retrieval quality is reduced to one score per turn:
//!
//! `confidence = 0.6 * top1 + 0.4 * mean(top3)`, missing slots counted as 0.
//!
//! | confidence          | strategy   | generation |
//! |---------------------|------------|------------|
//! | >= direct threshold | Direct     | none       |
//! | >= synthesize       | Synthesize | answer     |
//! | below               | Clarify    | question   |

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use wrench_core::config::RoutingConfig;
use wrench_core::safety::{split_sentences, SafetyScanner};
use wrench_core::types::{ChainId, ChatMessage, MessageRole, ProviderId};
use wrench_provider::FailoverExecutor;
use wrench_rag::ScoredAtom;

use crate::error::ChatError;
use crate::generator::{GenerationRequest, Generator};
use crate::persona::Persona;

const TOP1_WEIGHT: f64 = 0.6;
const TOP3_WEIGHT: f64 = 0.4;

/// How a turn is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Synthesize,
    Clarify,
}

/// Why a Clarify turn was chosen, when it is worth distinguishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// Retrieval found nothing above the similarity floor.
    LowConfidenceNoAtoms,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub confidence: f64,
    pub strategy: Strategy,
    pub reason: Option<RoutingReason>,
}

/// The routed answer, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedReply {
    pub decision: RoutingDecision,
    /// Reply body in the persona voice, without the warnings block.
    pub content: String,
    pub warnings: Vec<String>,
    /// Ids of the atoms the reply was built from.
    pub atoms_used: Vec<String>,
    /// Generation provider that served the reply, if one was called.
    pub provider: Option<ProviderId>,
}

/// Blend top-1 and top-3 similarities into a score in `[0, 1]`.
///
/// `similarities` must be sorted best first.
pub fn confidence(similarities: &[f64]) -> f64 {
    let slot = |i: usize| similarities.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
    let top1 = slot(0);
    let mean3 = (slot(0) + slot(1) + slot(2)) / 3.0;
    (TOP1_WEIGHT * top1 + TOP3_WEIGHT * mean3).clamp(0.0, 1.0)
}

/// Picks a strategy from retrieval confidence and produces the reply.
pub struct ConfidenceRouter {
    executor: Arc<FailoverExecutor>,
    generator: Arc<dyn Generator>,
    persona: Arc<Persona>,
    scanner: Arc<SafetyScanner>,
    chain: ChainId,
    config: RoutingConfig,
}

impl ConfidenceRouter {
    pub fn new(
        executor: Arc<FailoverExecutor>,
        generator: Arc<dyn Generator>,
        persona: Arc<Persona>,
        scanner: Arc<SafetyScanner>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            executor,
            generator,
            persona,
            scanner,
            chain: ChainId::new(config.generation_chain.as_str()),
            config,
        }
    }

    pub fn strategy_for(&self, confidence: f64) -> Strategy {
        if confidence >= self.config.direct_threshold {
            Strategy::Direct
        } else if confidence >= self.config.synthesize_threshold {
            Strategy::Synthesize
        } else {
            Strategy::Clarify
        }
    }

    /// Score ranked atoms. Pure; nothing carries over between turns.
    pub fn decide(&self, atoms: &[ScoredAtom]) -> RoutingDecision {
        let similarities: Vec<f64> = atoms.iter().take(3).map(|a| a.similarity).collect();
        let confidence = confidence(&similarities);
        let strategy = self.strategy_for(confidence);
        let reason = if atoms.is_empty() {
            Some(RoutingReason::LowConfidenceNoAtoms)
        } else {
            None
        };
        RoutingDecision {
            confidence,
            strategy,
            reason,
        }
    }

    /// Produce the reply for one turn.
    ///
    /// `atoms` are ranked best first. `history` is the conversation before
    /// this turn. A failed generation chain is returned as
    /// `ChatError::Provider` on both generating branches. The persona's
    /// fallback question only replaces a Clarify reply that asked nothing.
    pub async fn route(
        &self,
        query: &str,
        atoms: &[ScoredAtom],
        history: &[ChatMessage],
        equipment_context: Option<&str>,
    ) -> Result<RoutedReply, ChatError> {
        let decision = self.decide(atoms);
        debug!(
            confidence = decision.confidence,
            strategy = ?decision.strategy,
            atoms = atoms.len(),
            "Routing decision"
        );

        match decision.strategy {
            Strategy::Direct => Ok(self.direct(decision, atoms)),
            Strategy::Synthesize => {
                self.synthesize(decision, query, atoms, history, equipment_context)
                    .await
            }
            Strategy::Clarify => {
                self.clarify(decision, query, atoms, history, equipment_context)
                    .await
            }
        }
    }

    fn direct(&self, decision: RoutingDecision, atoms: &[ScoredAtom]) -> RoutedReply {
        // Direct requires confidence >= threshold > 0, so there is a top atom.
        let (content, atoms_used) = match atoms.first() {
            Some(top) => (
                self.persona.restyle_direct(&top.atom.content),
                vec![top.atom.id.clone()],
            ),
            None => (self.persona.fallback_question().to_string(), Vec::new()),
        };
        RoutedReply {
            decision,
            content,
            warnings: Vec::new(),
            atoms_used,
            provider: None,
        }
    }

    async fn synthesize(
        &self,
        decision: RoutingDecision,
        query: &str,
        atoms: &[ScoredAtom],
        history: &[ChatMessage],
        equipment_context: Option<&str>,
    ) -> Result<RoutedReply, ChatError> {
        let recent = recent_turns(history, self.config.history_turns);
        let request = self.persona.synthesize_request(
            query,
            atoms,
            &recent,
            equipment_context,
            self.config.max_tokens,
        );
        let served = self.generate(&request).await?;

        // An answer made only of warnings leaves an empty body; the warnings
        // block carries it alone.
        let split = self.scanner.split(&served.0);

        Ok(RoutedReply {
            decision,
            content: self.persona.restyle_synthesized(&split.body),
            warnings: split.warnings,
            atoms_used: atoms.iter().map(|a| a.atom.id.clone()).collect(),
            provider: Some(served.1),
        })
    }

    async fn clarify(
        &self,
        decision: RoutingDecision,
        query: &str,
        atoms: &[ScoredAtom],
        history: &[ChatMessage],
        equipment_context: Option<&str>,
    ) -> Result<RoutedReply, ChatError> {
        let recent = recent_turns(history, self.config.history_turns);
        let request = self.persona.clarify_request(
            query,
            atoms,
            &recent,
            equipment_context,
            self.config.max_tokens,
        );

        let (text, provider) = self.generate(&request).await?;
        let content = match extract_question(&text) {
            Some(question) => question,
            None => {
                debug!(provider = %provider, "Clarify reply was not a question; using fallback");
                self.persona.fallback_question().to_string()
            }
        };

        Ok(RoutedReply {
            decision,
            content,
            warnings: Vec::new(),
            atoms_used: atoms.iter().map(|a| a.atom.id.clone()).collect(),
            provider: Some(provider),
        })
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<(String, ProviderId), ChatError> {
        let generator = &self.generator;
        let served = self
            .executor
            .execute(&self.chain, |provider| async move {
                generator.generate(&provider, request).await
            })
            .await?;
        Ok((served.value.text, served.provider.id.clone()))
    }
}

/// The last `turns` non-system messages.
fn recent_turns(history: &[ChatMessage], turns: usize) -> Vec<ChatMessage> {
    let conversation: Vec<&ChatMessage> = history
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .collect();
    let start = conversation.len().saturating_sub(turns);
    conversation[start..].iter().map(|m| (*m).clone()).collect()
}

/// The question sentences of a model reply, or `None` if it asked nothing.
fn extract_question(text: &str) -> Option<String> {
    let questions: Vec<&str> = text
        .lines()
        .flat_map(split_sentences)
        .map(str::trim)
        .filter(|s| s.ends_with('?') && s.len() > 1)
        .collect();
    if questions.is_empty() {
        None
    } else {
        Some(questions.join(" "))
    }
}
