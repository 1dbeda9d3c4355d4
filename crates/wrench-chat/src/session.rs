//! Session lifecycle and message history.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use wrench_core::config::SessionConfig;
use wrench_core::types::{ChatMessage, ChatSession, MessageRole, SessionStatus};
use wrench_storage::SessionRepository;

use crate::error::ChatError;
use crate::persona::Persona;

/// Owns every session state change. `append_message` is the only way
/// history grows.
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    persona: Arc<Persona>,
    config: SessionConfig,
    /// Serializes appends within one session.
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>, persona: Arc<Persona>, config: SessionConfig) -> Self {
        Self {
            repo,
            persona,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn inactivity_window(&self) -> Duration {
        Duration::minutes(self.config.inactivity_minutes)
    }

    /// Create an `Active` session and store the persona preamble as its
    /// first message.
    pub fn start(
        &self,
        external_chat_id: &str,
        vendor: &str,
        equipment_context: Option<&str>,
    ) -> Result<ChatSession, ChatError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4(),
            external_chat_id: external_chat_id.to_string(),
            vendor: vendor.trim().to_string(),
            status: SessionStatus::Active,
            equipment_context: equipment_context.map(str::to_string),
            created_at: now,
            last_message_at: now,
        };
        self.repo.create(&session)?;

        let preamble = self
            .persona
            .system_preamble(&session.vendor, session.equipment_context.as_deref());
        self.append_message(session.id, MessageRole::System, &preamble, None, Vec::new())?;

        info!(session = %session.id, external = %session.external_chat_id, vendor = %session.vendor, "Session started");
        self.get(session.id)
    }

    pub fn get(&self, session_id: Uuid) -> Result<ChatSession, ChatError> {
        self.repo
            .get(session_id)?
            .ok_or(ChatError::SessionNotFound(session_id))
    }

    /// Append a message to an `Active` session.
    ///
    /// Sequence numbers are assigned under the session's lock, so concurrent
    /// appends to one session are stored in a single total order.
    pub fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        confidence: Option<f64>,
        atoms_used: Vec<String>,
    ) -> Result<ChatMessage, ChatError> {
        // Unknown ids never get a lock entry.
        self.get(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock
            .lock()
            .map_err(|e| ChatError::Storage(format!("session lock poisoned: {}", e)))?;

        let session = self.get(session_id)?;
        if session.status != SessionStatus::Active {
            return Err(ChatError::SessionInactive(session_id));
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            seq: self.repo.last_seq(session_id)? + 1,
            role,
            content: content.to_string(),
            confidence,
            atoms_used,
            created_at: Utc::now(),
        };

        // A sweep may have timed the session out since the status check.
        if !self.repo.append(&message)? {
            return Err(ChatError::SessionInactive(session_id));
        }
        debug!(session = %session_id, seq = message.seq, role = message.role.as_str(), "Message appended");
        Ok(message)
    }

    /// The most recent messages, oldest first. `None` uses the configured
    /// default limit.
    pub fn fetch_history(
        &self,
        session_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        if self.repo.get(session_id)?.is_none() {
            return Err(ChatError::SessionNotFound(session_id));
        }
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.repo.fetch_history(session_id, limit)?)
    }

    /// Close an `Active` session. Closing a timed out or closed session is
    /// `SessionInactive`.
    pub fn close(&self, session_id: Uuid) -> Result<(), ChatError> {
        self.get(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock
            .lock()
            .map_err(|e| ChatError::Storage(format!("session lock poisoned: {}", e)))?;

        if !self.repo.update_status(session_id, SessionStatus::Closed)? {
            return Err(ChatError::SessionInactive(session_id));
        }
        drop(_guard);
        self.locks.remove(&session_id);
        info!(session = %session_id, "Session closed");
        Ok(())
    }

    /// Time out every `Active` session idle longer than the inactivity
    /// window.
    pub fn sweep(&self) -> Result<Vec<Uuid>, ChatError> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ChatError> {
        let cutoff = now - self.inactivity_window();
        let expired = self.repo.sweep_expired(cutoff)?;
        for id in &expired {
            self.locks.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Timed out idle sessions");
        }
        Ok(expired)
    }

    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}
