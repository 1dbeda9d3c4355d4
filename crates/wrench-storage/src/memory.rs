//! In-memory session repository.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use wrench_core::error::WrenchError;
use wrench_core::types::{ChatMessage, ChatSession, SessionStatus};

use crate::repository::SessionRepository;

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<Uuid, ChatSession>,
    messages: HashMap<Uuid, Vec<ChatMessage>>,
}

/// Sessions and messages held in a single mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    state: Mutex<State>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, WrenchError> {
        self.state
            .lock()
            .map_err(|e| WrenchError::Storage(format!("session lock poisoned: {}", e)))
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn create(&self, session: &ChatSession) -> Result<(), WrenchError> {
        let mut state = self.lock()?;
        if state.sessions.contains_key(&session.id) {
            return Err(WrenchError::Storage(format!(
                "session {} already exists",
                session.id
            )));
        }
        state.sessions.insert(session.id, session.clone());
        state.messages.insert(session.id, Vec::new());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<ChatSession>, WrenchError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    fn append(&self, message: &ChatMessage) -> Result<bool, WrenchError> {
        let mut state = self.lock()?;
        match state.sessions.get_mut(&message.session_id) {
            Some(session) if session.status == SessionStatus::Active => {
                session.last_message_at = message.created_at;
            }
            _ => return Ok(false),
        }
        state
            .messages
            .entry(message.session_id)
            .or_default()
            .push(message.clone());
        Ok(true)
    }

    fn last_seq(&self, session_id: Uuid) -> Result<u64, WrenchError> {
        Ok(self
            .lock()?
            .messages
            .get(&session_id)
            .and_then(|m| m.last())
            .map(|m| m.seq)
            .unwrap_or(0))
    }

    fn fetch_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, WrenchError> {
        let state = self.lock()?;
        let messages = match state.messages.get(&session_id) {
            Some(m) => m,
            None => return Ok(Vec::new()),
        };
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, WrenchError> {
        let mut state = self.lock()?;
        match state.sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::Active => {
                session.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, WrenchError> {
        let mut state = self.lock()?;
        let mut expired = Vec::new();
        for session in state.sessions.values_mut() {
            if session.status == SessionStatus::Active && session.last_message_at < cutoff {
                session.status = SessionStatus::TimedOut;
                expired.push(session.id);
            }
        }
        Ok(expired)
    }
}
