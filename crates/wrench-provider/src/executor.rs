//! Sequential failover across a provider chain.
//!
//! One invocation walks the eligible providers of a chain in priority order.
//! Each attempt runs under a hard timeout and is classified; any failure
//! advances to the next provider. No provider is tried twice and no two
//! providers are ever called concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wrench_core::config::FailoverConfig;
use wrench_core::events::{AlertEvent, AlertNotifier};
use wrench_core::types::{AttemptOutcome, ChainId, ProviderId, Timestamp};

use crate::error::{FailoverError, ProviderError};
use crate::health::HealthMonitor;
use crate::registry::{Provider, ProviderRegistry};

/// Audit record of one provider attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailoverAttempt {
    pub provider_id: ProviderId,
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
    pub outcome: AttemptOutcome,
    pub error_detail: Option<String>,
}

/// Successful result of an executor invocation.
#[derive(Debug, Clone)]
pub struct Served<T> {
    pub value: T,
    /// Provider that produced `value`.
    pub provider: Arc<Provider>,
    /// Every attempt made, the successful one last.
    pub attempts: Vec<FailoverAttempt>,
}

impl<T> Served<T> {
    /// True if a provider other than the top eligible one served the request.
    pub fn failed_over(&self) -> bool {
        self.attempts.len() > 1
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            value: f(self.value),
            provider: self.provider,
            attempts: self.attempts,
        }
    }
}

/// Walks provider chains with per-attempt timeouts.
pub struct FailoverExecutor {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMonitor>,
    notifier: Arc<dyn AlertNotifier>,
    timeouts: FailoverConfig,
}

impl FailoverExecutor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthMonitor>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            registry,
            health,
            notifier,
            timeouts: FailoverConfig::default(),
        }
    }

    /// Override the per-kind attempt timeouts.
    pub fn with_timeouts(mut self, timeouts: FailoverConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Timeout applied to one attempt against `provider`.
    pub fn timeout_for(&self, provider: &Provider) -> Duration {
        provider
            .timeout
            .unwrap_or_else(|| self.timeouts.timeout_for(provider.kind))
    }

    /// [`execute_with_failover`](Self::execute_with_failover) without a
    /// cancellation handle.
    pub async fn execute<T, F, Fut>(
        &self,
        chain: &ChainId,
        request: F,
    ) -> Result<Served<T>, FailoverError>
    where
        F: FnMut(Arc<Provider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.execute_with_failover(chain, &CancellationToken::new(), request)
            .await
    }

    /// Call `request` against each eligible provider of `chain` in priority
    /// order until one succeeds.
    ///
    /// Cancellation is checked before every attempt; an in-flight attempt
    /// runs to completion or timeout. A chain with no eligible providers
    /// returns `ChainExhausted` without calling `request`.
    pub async fn execute_with_failover<T, F, Fut>(
        &self,
        chain: &ChainId,
        cancel: &CancellationToken,
        mut request: F,
    ) -> Result<Served<T>, FailoverError>
    where
        F: FnMut(Arc<Provider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let providers = self.registry.list_eligible(chain);
        let mut attempts: Vec<FailoverAttempt> = Vec::with_capacity(providers.len());

        if providers.is_empty() {
            error!(chain = %chain, "No eligible providers in chain");
            return Err(FailoverError::ChainExhausted {
                chain: chain.clone(),
                attempts,
            });
        }

        for (index, provider) in providers.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(chain = %chain, attempts = attempts.len(), "Failover cancelled");
                return Err(FailoverError::Cancelled {
                    chain: chain.clone(),
                    attempts,
                });
            }

            let timeout = self.timeout_for(provider);
            let timestamp = Utc::now();
            let started = Instant::now();
            debug!(chain = %chain, provider = %provider.id, timeout_ms = timeout.as_millis() as u64, "Attempting provider");

            let result = match tokio::time::timeout(timeout, request(Arc::clone(provider))).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            let latency = started.elapsed();

            match result {
                Ok(value) => {
                    attempts.push(FailoverAttempt {
                        provider_id: provider.id.clone(),
                        timestamp,
                        latency,
                        outcome: AttemptOutcome::Success,
                        error_detail: None,
                    });
                    self.health.record(&provider.id, AttemptOutcome::Success);

                    if index > 0 {
                        self.notify_failover(chain, &providers[0].id, provider, &attempts);
                    }
                    debug!(chain = %chain, provider = %provider.id, latency_ms = latency.as_millis() as u64, "Provider served request");

                    return Ok(Served {
                        value,
                        provider: Arc::clone(provider),
                        attempts,
                    });
                }
                Err(e) => {
                    let outcome = e.outcome();
                    warn!(
                        chain = %chain,
                        provider = %provider.id,
                        outcome = ?outcome,
                        latency_ms = latency.as_millis() as u64,
                        error = %e,
                        "Provider attempt failed"
                    );
                    attempts.push(FailoverAttempt {
                        provider_id: provider.id.clone(),
                        timestamp,
                        latency,
                        outcome,
                        error_detail: Some(e.to_string()),
                    });
                    self.health.record(&provider.id, outcome);
                }
            }
        }

        error!(chain = %chain, attempts = attempts.len(), "Provider chain exhausted");
        Err(FailoverError::ChainExhausted {
            chain: chain.clone(),
            attempts,
        })
    }

    fn notify_failover(
        &self,
        chain: &ChainId,
        primary: &ProviderId,
        serving: &Provider,
        attempts: &[FailoverAttempt],
    ) {
        let failed: Vec<ProviderId> = attempts
            .iter()
            .filter(|a| !a.outcome.is_success())
            .map(|a| a.provider_id.clone())
            .collect();
        let reason = attempts
            .iter()
            .filter_map(|a| {
                a.error_detail
                    .as_ref()
                    .map(|d| format!("{}: {}", a.provider_id, d))
            })
            .collect::<Vec<_>>()
            .join("; ");

        info!(chain = %chain, provider = %serving.id, primary = %primary, "Request served by fallback provider");
        self.notifier.notify(AlertEvent::FailoverOccurred {
            chain: chain.clone(),
            provider_id: serving.id.clone(),
            primary_id: primary.clone(),
            failed,
            timestamp: Timestamp::now(),
            reason,
        });
    }
}

impl std::fmt::Debug for FailoverExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverExecutor")
            .field("registry", &self.registry)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
