//! Error types for the support chat.

use uuid::Uuid;

use wrench_core::error::WrenchError;
use wrench_provider::FailoverError;
use wrench_rag::RetrievalError;

/// Errors from the chat engine and session store.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("session is not active: {0}")]
    SessionInactive(Uuid),
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message is {len} characters, maximum is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("generation error: {0}")]
    Provider(#[from] FailoverError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("core error: {0}")]
    Core(WrenchError),
}

impl From<WrenchError> for ChatError {
    fn from(err: WrenchError) -> Self {
        match err {
            WrenchError::Storage(msg) => ChatError::Storage(msg),
            other => ChatError::Core(other),
        }
    }
}
