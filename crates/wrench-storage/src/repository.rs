use chrono::{DateTime, Utc};
use uuid::Uuid;

use wrench_core::error::WrenchError;
use wrench_core::types::{ChatMessage, ChatSession, SessionStatus};

/// Persistence for chat sessions and their messages.
///
/// Implementations must make `append` and `sweep_expired` atomic with respect
/// to the session status: a message is never stored for a session that is no
/// longer `Active`.
pub trait SessionRepository: Send + Sync {
    fn create(&self, session: &ChatSession) -> Result<(), WrenchError>;

    fn get(&self, id: Uuid) -> Result<Option<ChatSession>, WrenchError>;

    /// Store a message and bump the session's `last_message_at` to the
    /// message's `created_at`. Returns `false`, storing nothing, if the
    /// session is missing or not `Active`.
    fn append(&self, message: &ChatMessage) -> Result<bool, WrenchError>;

    /// Highest message sequence number of a session, 0 if it has none.
    fn last_seq(&self, session_id: Uuid) -> Result<u64, WrenchError>;

    /// The `limit` most recent messages in chronological order.
    fn fetch_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, WrenchError>;

    /// Set the status of an `Active` session. Returns `false` if the session
    /// is missing or already terminal.
    fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, WrenchError>;

    /// Mark every `Active` session idle since before `cutoff` as `TimedOut`.
    /// Returns the ids that changed.
    fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, WrenchError>;
}
