//! Chat turn orchestration: validate, persist, retrieve, route, persist.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use wrench_core::types::{ChatMessage, MessageRole, ProviderId, SessionStatus};
use wrench_rag::RagRetriever;

use crate::error::ChatError;
use crate::persona::Persona;
use crate::router::{ConfidenceRouter, RoutingDecision};
use crate::session::SessionStore;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Outcome of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    /// The stored assistant message, warnings block included.
    pub message: ChatMessage,
    pub decision: RoutingDecision,
    pub warnings: Vec<String>,
    /// Generation provider that served the reply, if one was called.
    pub provider: Option<ProviderId>,
}

/// Runs a user message through retrieval and routing.
pub struct ChatEngine {
    sessions: Arc<SessionStore>,
    retriever: Arc<RagRetriever>,
    router: Arc<ConfidenceRouter>,
    persona: Arc<Persona>,
}

impl ChatEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        retriever: Arc<RagRetriever>,
        router: Arc<ConfidenceRouter>,
        persona: Arc<Persona>,
    ) -> Self {
        Self {
            sessions,
            retriever,
            router,
            persona,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one technician message.
    ///
    /// Retrieval sees the history before this message, so the query is not
    /// repeated in its own summary. A retrieval or generation failure leaves
    /// the user message stored without a reply.
    pub async fn handle_message(
        &self,
        session_id: Uuid,
        text: &str,
    ) -> Result<TurnResponse, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong {
                len,
                max: MAX_MESSAGE_LENGTH,
            });
        }

        let session = self.sessions.get(session_id)?;
        if session.status != SessionStatus::Active {
            return Err(ChatError::SessionInactive(session_id));
        }

        let history = self.sessions.fetch_history(session_id, None)?;
        self.sessions
            .append_message(session_id, MessageRole::User, text, None, Vec::new())?;

        let vendor = Some(session.vendor.as_str()).filter(|v| !v.is_empty());
        let atoms = self
            .retriever
            .retrieve(text, vendor, &history, self.retriever.top_k())
            .await?;

        let reply = self
            .router
            .route(text, &atoms, &history, session.equipment_context.as_deref())
            .await?;

        let content = format!(
            "{}{}",
            reply.content,
            self.persona.render_warnings(&reply.warnings)
        );
        let message = self.sessions.append_message(
            session_id,
            MessageRole::Assistant,
            &content,
            Some(reply.decision.confidence),
            reply.atoms_used,
        )?;

        info!(
            session = %session_id,
            strategy = ?reply.decision.strategy,
            confidence = reply.decision.confidence,
            atoms = atoms.len(),
            warnings = reply.warnings.len(),
            "Turn answered"
        );

        Ok(TurnResponse {
            session_id,
            message,
            decision: reply.decision,
            warnings: reply.warnings,
            provider: reply.provider,
        })
    }
}
