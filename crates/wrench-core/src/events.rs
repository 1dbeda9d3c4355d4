//! Operational alerts and the sinks they are delivered to.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::types::{ChainId, HealthState, ProviderId, Timestamp};

/// Alerts raised by the failover executor and the health monitor.
///
/// Alerts are advisory. They are delivered to an [`AlertNotifier`] and never
/// influence which provider is attempted next.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum AlertEvent {
    // =========================================================================
    // Failover
    // =========================================================================
    /// A request was served by a provider other than the top eligible one.
    /// Raised at most once per executor invocation.
    FailoverOccurred {
        chain: ChainId,
        /// Provider that finally served the request.
        provider_id: ProviderId,
        /// Top eligible provider of the chain.
        primary_id: ProviderId,
        /// Providers that failed before the serving one, in attempt order.
        failed: Vec<ProviderId>,
        timestamp: Timestamp,
        reason: String,
    },

    // =========================================================================
    // Health
    // =========================================================================
    /// A provider's advisory health changed state.
    HealthTransition {
        provider_id: ProviderId,
        previous: Option<HealthState>,
        new: HealthState,
        timestamp: Timestamp,
        reason: String,
    },
}

impl AlertEvent {
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            AlertEvent::FailoverOccurred { provider_id, .. } => provider_id,
            AlertEvent::HealthTransition { provider_id, .. } => provider_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            AlertEvent::FailoverOccurred { timestamp, .. } => *timestamp,
            AlertEvent::HealthTransition { timestamp, .. } => *timestamp,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            AlertEvent::FailoverOccurred { reason, .. } => reason,
            AlertEvent::HealthTransition { reason, .. } => reason,
        }
    }
}

/// Sink for operational alerts.
///
/// Implementations must not block; delivery is fire-and-forget.
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, event: AlertEvent);
}

/// Writes alerts to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl AlertNotifier for TracingNotifier {
    fn notify(&self, event: AlertEvent) {
        match &event {
            AlertEvent::FailoverOccurred {
                chain,
                provider_id,
                primary_id,
                failed,
                reason,
                ..
            } => warn!(
                chain = %chain,
                provider = %provider_id,
                primary = %primary_id,
                failed = failed.len(),
                reason = %reason,
                "Failover occurred"
            ),
            AlertEvent::HealthTransition {
                provider_id,
                previous,
                new,
                reason,
                ..
            } => {
                let previous = previous.map(|p| p.to_string()).unwrap_or_else(|| "none".into());
                if *new == HealthState::Healthy {
                    info!(provider = %provider_id, previous = %previous, new = %new, reason = %reason, "Provider health changed");
                } else {
                    warn!(provider = %provider_id, previous = %previous, new = %new, reason = %reason, "Provider health changed");
                }
            }
        }
    }
}

/// Fans alerts out to any number of subscribers over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<AlertEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }
}

impl AlertNotifier for BroadcastNotifier {
    fn notify(&self, event: AlertEvent) {
        if self.tx.send(event).is_err() {
            debug!("Alert dropped: no subscribers");
        }
    }
}

/// Keeps every alert in memory. Useful for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<AlertEvent>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the alerts received so far, oldest first.
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertNotifier for MemoryNotifier {
    fn notify(&self, event: AlertEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition() -> AlertEvent {
        AlertEvent::HealthTransition {
            provider_id: ProviderId::from("groq"),
            previous: Some(HealthState::Healthy),
            new: HealthState::Degraded,
            timestamp: Timestamp(1_700_000_000),
            reason: "success ratio 0.60 below 0.80".to_string(),
        }
    }

    #[test]
    fn test_alert_serializes_with_type_tag() {
        let json = serde_json::to_value(transition()).unwrap();
        assert_eq!(json["type"], "health_transition");
        assert_eq!(json["provider_id"], "groq");
        assert_eq!(json["previous"], "healthy");
        assert_eq!(json["new"], "degraded");

        let back: AlertEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, transition());
    }

    #[test]
    fn test_accessors() {
        let event = AlertEvent::FailoverOccurred {
            chain: ChainId::from("generation"),
            provider_id: ProviderId::from("gemini"),
            primary_id: ProviderId::from("groq"),
            failed: vec![ProviderId::from("groq")],
            timestamp: Timestamp(42),
            reason: "groq: timed out".to_string(),
        };
        assert_eq!(event.provider_id().as_str(), "gemini");
        assert_eq!(event.timestamp(), Timestamp(42));
        assert_eq!(event.reason(), "groq: timed out");
    }

    #[test]
    fn test_memory_notifier_collects() {
        let notifier = MemoryNotifier::new();
        assert!(notifier.is_empty());
        notifier.notify(transition());
        notifier.notify(transition());
        assert_eq!(notifier.len(), 2);
        assert_eq!(notifier.events()[0], transition());
    }

    #[tokio::test]
    async fn test_broadcast_notifier_delivers_to_subscribers() {
        let notifier = BroadcastNotifier::new(16);
        let mut rx = notifier.subscribe();
        notifier.notify(transition());
        let received = rx.recv().await.unwrap();
        assert_eq!(received, transition());
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_panic() {
        let notifier = BroadcastNotifier::new(4);
        notifier.notify(transition());
    }

    #[test]
    fn test_tracing_notifier_accepts_all_variants() {
        TracingNotifier.notify(transition());
        TracingNotifier.notify(AlertEvent::HealthTransition {
            provider_id: ProviderId::from("neon"),
            previous: None,
            new: HealthState::Healthy,
            timestamp: Timestamp::now(),
            reason: "recovered".to_string(),
        });
    }
}
