use std::time::Duration;

use wrench_core::error::WrenchError;
use wrench_core::types::{AttemptOutcome, ChainId, ProviderId};

use crate::executor::FailoverAttempt;

/// Failure of a single provider call, as reported by the request closure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Authentication or request validation rejected by the provider.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Map an HTTP status and response body to a provider error.
    ///
    /// 408, 429 and 5xx are transient; every other status is permanent.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => ProviderError::RateLimited(format!("HTTP {}: {}", status, body)),
            408 | 500..=599 => ProviderError::Unavailable(format!("HTTP {}: {}", status, body)),
            _ => ProviderError::Rejected(format!("HTTP {}: {}", status, body)),
        }
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimited(_)
            | ProviderError::Unavailable(_) => AttemptOutcome::TransientFailure,
            ProviderError::Rejected(_) | ProviderError::Malformed(_) => {
                AttemptOutcome::PermanentFailure
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.outcome() == AttemptOutcome::TransientFailure
    }
}

/// Rejected provider configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("provider name must not be empty")]
    EmptyName,

    #[error("provider '{provider}' has an empty chain name")]
    EmptyChain { provider: ProviderId },

    #[error("duplicate provider name '{0}'")]
    DuplicateName(ProviderId),

    #[error("duplicate priority {priority} in chain '{chain}': '{existing}' and '{provider}'")]
    DuplicatePriority {
        chain: ChainId,
        priority: u32,
        existing: ProviderId,
        provider: ProviderId,
    },
}

impl From<RegistryError> for WrenchError {
    fn from(err: RegistryError) -> Self {
        WrenchError::Validation(err.to_string())
    }
}

/// Aggregate failure of one executor invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FailoverError {
    /// Every eligible provider failed, or the chain has none.
    #[error("chain '{chain}' exhausted after {} attempt(s)", attempts.len())]
    ChainExhausted {
        chain: ChainId,
        attempts: Vec<FailoverAttempt>,
    },

    /// The caller cancelled before the chain finished.
    #[error("chain '{chain}' cancelled after {} attempt(s)", attempts.len())]
    Cancelled {
        chain: ChainId,
        attempts: Vec<FailoverAttempt>,
    },
}

impl FailoverError {
    pub fn chain(&self) -> &ChainId {
        match self {
            FailoverError::ChainExhausted { chain, .. } => chain,
            FailoverError::Cancelled { chain, .. } => chain,
        }
    }

    /// Attempts made before giving up, in order.
    pub fn attempts(&self) -> &[FailoverAttempt] {
        match self {
            FailoverError::ChainExhausted { attempts, .. } => attempts,
            FailoverError::Cancelled { attempts, .. } => attempts,
        }
    }
}
