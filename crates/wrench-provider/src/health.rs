//! Advisory provider health.
//!
//! Each provider keeps a bounded ring buffer of recent attempt outcomes.
//! The derived state feeds dashboards and alerts only; the executor never
//! skips a provider because of it.
//!
//! # Classification
//!
//! - `Healthy`: empty window, or success ratio at or above the threshold
//! - `Failed`: window full and not a single success
//! - `Degraded`: anything else
//!
//! Concurrent records for the same provider are serialized per map shard,
//! but two executors may interleave their records. Counts are approximate
//! under contention.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use wrench_core::config::HealthConfig;
use wrench_core::events::{AlertEvent, AlertNotifier};
use wrench_core::types::{AttemptOutcome, HealthState, ProviderId, Timestamp};

/// Point-in-time view of one provider's window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub provider_id: ProviderId,
    pub state: HealthState,
    pub successes: usize,
    pub total: usize,
    pub capacity: usize,
    pub success_ratio: f64,
}

#[derive(Debug)]
struct Window {
    outcomes: VecDeque<(Instant, bool)>,
    state: HealthState,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            state: HealthState::Healthy,
        }
    }

    fn successes(&self) -> usize {
        self.outcomes.iter().filter(|(_, ok)| *ok).count()
    }

    fn ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            1.0
        } else {
            self.successes() as f64 / self.outcomes.len() as f64
        }
    }
}

/// Rolling success/failure windows for every provider that has been attempted.
pub struct HealthMonitor {
    windows: DashMap<ProviderId, Window>,
    capacity: usize,
    healthy_threshold: f64,
    max_age: Option<Duration>,
    notifier: Arc<dyn AlertNotifier>,
}

impl HealthMonitor {
    pub fn new(config: &HealthConfig, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self {
            windows: DashMap::new(),
            capacity: config.window_size.max(1),
            healthy_threshold: config.healthy_threshold.clamp(0.0, 1.0),
            max_age: config.max_age_secs.map(Duration::from_secs),
            notifier,
        }
    }

    /// Record an attempt outcome now. Returns the new state if it changed.
    pub fn record(&self, provider: &ProviderId, outcome: AttemptOutcome) -> Option<HealthState> {
        self.record_at(provider, outcome, Instant::now())
    }

    /// Record an attempt outcome observed at `at`.
    ///
    /// A state change emits exactly one `HealthTransition` alert.
    pub fn record_at(
        &self,
        provider: &ProviderId,
        outcome: AttemptOutcome,
        at: Instant,
    ) -> Option<HealthState> {
        let transition = {
            let mut window = self
                .windows
                .entry(provider.clone())
                .or_insert_with(|| Window::new(self.capacity));

            if window.outcomes.len() == self.capacity {
                window.outcomes.pop_front();
            }
            window.outcomes.push_back((at, outcome.is_success()));
            self.prune(&mut *window, at);

            let new = self.classify(&window);
            let previous = window.state;
            window.state = new;
            (new != previous).then(|| (previous, new, self.describe(&window)))
        };

        let (previous, new, reason) = transition?;
        self.notifier.notify(AlertEvent::HealthTransition {
            provider_id: provider.clone(),
            previous: Some(previous),
            new,
            timestamp: Timestamp::now(),
            reason,
        });
        Some(new)
    }

    /// Current state. Providers never attempted are `Healthy`.
    pub fn state(&self, provider: &ProviderId) -> HealthState {
        self.windows
            .get(provider)
            .map(|w| w.state)
            .unwrap_or(HealthState::Healthy)
    }

    pub fn snapshot(&self, provider: &ProviderId) -> Option<HealthSnapshot> {
        self.windows
            .get(provider)
            .map(|w| self.to_snapshot(provider, &w))
    }

    /// Snapshots of every tracked provider, sorted by id.
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        let mut all: Vec<HealthSnapshot> = self
            .windows
            .iter()
            .map(|entry| self.to_snapshot(entry.key(), entry.value()))
            .collect();
        all.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        all
    }

    fn prune(&self, window: &mut Window, now: Instant) {
        if let Some(max_age) = self.max_age {
            while let Some((at, _)) = window.outcomes.front() {
                if now.saturating_duration_since(*at) > max_age {
                    window.outcomes.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    fn classify(&self, window: &Window) -> HealthState {
        let total = window.outcomes.len();
        if total == 0 || window.ratio() >= self.healthy_threshold {
            HealthState::Healthy
        } else if total == self.capacity && window.successes() == 0 {
            HealthState::Failed
        } else {
            HealthState::Degraded
        }
    }

    fn describe(&self, window: &Window) -> String {
        format!(
            "{}/{} recent attempts succeeded (ratio {:.2}, healthy at {:.2})",
            window.successes(),
            window.outcomes.len(),
            window.ratio(),
            self.healthy_threshold
        )
    }

    fn to_snapshot(&self, provider: &ProviderId, window: &Window) -> HealthSnapshot {
        HealthSnapshot {
            provider_id: provider.clone(),
            state: window.state,
            successes: window.successes(),
            total: window.outcomes.len(),
            capacity: self.capacity,
            success_ratio: window.ratio(),
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("providers", &self.windows.len())
            .field("capacity", &self.capacity)
            .field("healthy_threshold", &self.healthy_threshold)
            .finish()
    }
}
