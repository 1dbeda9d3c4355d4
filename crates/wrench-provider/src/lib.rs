//! Wrench Provider crate - ordered provider chains with failover.
//!
//! - `ProviderRegistry` validates credentials once at load and orders each
//!   chain by priority.
//! - `FailoverExecutor` walks a chain sequentially under per-attempt
//!   timeouts and returns the first success or an exhausted-chain error.
//! - `HealthMonitor` keeps an advisory rolling window per provider.
//! - `ResponseAdapter` normalizes vendor LLM payloads.

pub mod adapter;
pub mod credential;
pub mod error;
pub mod executor;
pub mod health;
pub mod registry;

pub use adapter::{adapter_for, Completion, GeminiAdapter, OpenAiAdapter, ParseOutcome, ResponseAdapter, Usage};
pub use credential::validate_credential;
pub use error::{FailoverError, ProviderError, RegistryError};
pub use executor::{FailoverAttempt, FailoverExecutor, Served};
pub use health::{HealthMonitor, HealthSnapshot};
pub use registry::{Eligibility, Provider, ProviderRegistry};
pub use tokio_util::sync::CancellationToken;
