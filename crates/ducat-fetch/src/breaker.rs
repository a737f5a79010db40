//! Per-host circuit breaker.
//!
//! After `failure_threshold` consecutive failures inside the rolling window the
//! circuit for that host opens and [`CircuitBreaker::allow`] refuses requests.
//! Once the cooldown has elapsed a single probe request is let through
//! (half-open); its success closes the circuit and its failure reopens it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::FailureKind;

/// Tuning for [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Failures older than this no longer count towards the threshold, in milliseconds.
    pub window_ms: u64,
    /// How long an open circuit refuses requests, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 30_000,
            cooldown_ms: 60_000,
        }
    }
}

impl BreakerConfig {
    /// Returns the rolling window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Returns the cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Observable state of one host's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are refused until the cooldown deadline.
    Open,
    /// A single probe request is allowed.
    HalfOpen,
}

/// Failure counters for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Network and server failures recorded.
    pub failures: u64,
    /// Rate-limit responses recorded.
    pub rate_limited: u64,
    /// Times the circuit has opened.
    pub trips: u64,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { until: Instant },
    HalfOpen { probe_started: Option<Instant> },
}

#[derive(Debug)]
struct HostCircuit {
    phase: Phase,
    recent_failures: VecDeque<Instant>,
    stats: HostStats,
}

impl HostCircuit {
    const fn new() -> Self {
        Self {
            phase: Phase::Closed,
            recent_failures: VecDeque::new(),
            stats: HostStats {
                failures: 0,
                rate_limited: 0,
                trips: 0,
            },
        }
    }
}

/// Failure tracker shared by every fetch against the same hosts.
///
/// Wrap in an `Arc` and hand the same instance to every fetcher that should
/// share failure accounting.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    hosts: Mutex<HashMap<String, HostCircuit>>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostCircuit>> {
        // The map is left consistent between statements, so a poisoned lock is usable.
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if a request to `host` may be attempted now.
    ///
    /// After the cooldown this returns true exactly once until the probe's
    /// outcome is recorded. A probe that never reports back is replaced after
    /// another cooldown.
    pub fn allow(&self, host: &str) -> bool {
        let now = Instant::now();
        let mut hosts = self.lock();
        let Some(circuit) = hosts.get_mut(host) else {
            return true;
        };

        match circuit.phase {
            Phase::Closed => true,
            Phase::Open { until } if now >= until => {
                tracing::info!(host, "circuit half-open, allowing probe request");
                circuit.phase = Phase::HalfOpen {
                    probe_started: Some(now),
                };
                true
            }
            Phase::Open { .. } => false,
            Phase::HalfOpen { probe_started } => {
                let stale = probe_started
                    .is_none_or(|started| now.duration_since(started) >= self.config.cooldown());
                if stale {
                    circuit.phase = Phase::HalfOpen {
                        probe_started: Some(now),
                    };
                }
                stale
            }
        }
    }

    /// Records a completed request that the host answered normally.
    pub fn record_success(&self, host: &str) {
        let mut hosts = self.lock();
        let Some(circuit) = hosts.get_mut(host) else {
            return;
        };

        if !matches!(circuit.phase, Phase::Closed) {
            tracing::info!(host, "circuit closed");
        }
        circuit.phase = Phase::Closed;
        circuit.recent_failures.clear();
    }

    /// Records a failed request.
    pub fn record_failure(&self, host: &str, kind: FailureKind) {
        let now = Instant::now();
        let window = self.config.window();
        let threshold = self.config.failure_threshold.max(1) as usize;
        let cooldown = self.config.cooldown();

        let mut hosts = self.lock();
        let circuit = hosts
            .entry(host.to_string())
            .or_insert_with(HostCircuit::new);

        match kind {
            FailureKind::RateLimited => circuit.stats.rate_limited += 1,
            FailureKind::Network | FailureKind::Server => circuit.stats.failures += 1,
        }

        let trip = match circuit.phase {
            Phase::HalfOpen { .. } => true,
            Phase::Open { .. } => false,
            Phase::Closed => {
                circuit.recent_failures.push_back(now);
                while circuit
                    .recent_failures
                    .front()
                    .is_some_and(|at| now.duration_since(*at) > window)
                {
                    circuit.recent_failures.pop_front();
                }
                circuit.recent_failures.len() >= threshold
            }
        };

        if trip {
            circuit.phase = Phase::Open {
                until: now + cooldown,
            };
            circuit.recent_failures.clear();
            circuit.stats.trips += 1;
            tracing::warn!(
                host,
                ?kind,
                cooldown_ms = self.config.cooldown_ms,
                "circuit opened"
            );
        }
    }

    /// Returns how long until an open circuit admits a probe.
    ///
    /// `None` means the caller should not wait on a deadline: the circuit is
    /// closed, or half-open with a probe already in flight.
    #[must_use]
    pub fn retry_after(&self, host: &str) -> Option<Duration> {
        let hosts = self.lock();
        match hosts.get(host)?.phase {
            Phase::Open { until } => Some(until.saturating_duration_since(Instant::now())),
            Phase::Closed | Phase::HalfOpen { .. } => None,
        }
    }

    /// Returns the current state of `host`'s circuit.
    #[must_use]
    pub fn state(&self, host: &str) -> CircuitState {
        let hosts = self.lock();
        match hosts.get(host).map(|c| c.phase) {
            None | Some(Phase::Closed) => CircuitState::Closed,
            Some(Phase::Open { .. }) => CircuitState::Open,
            Some(Phase::HalfOpen { .. }) => CircuitState::HalfOpen,
        }
    }

    /// Returns failure counters for `host`.
    #[must_use]
    pub fn stats(&self, host: &str) -> HostStats {
        self.lock().get(host).map(|c| c.stats).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "datafeed.example.com";

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig::default())
    }

    fn fail(breaker: &CircuitBreaker, times: u32) {
        for _ in 0..times {
            breaker.record_failure(HOST, FailureKind::Server);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_closed() {
        let breaker = breaker();
        assert!(breaker.allow(HOST));
        assert_eq!(breaker.state(HOST), CircuitState::Closed);
        assert_eq!(breaker.retry_after(HOST), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let breaker = breaker();
        fail(&breaker, 4);
        assert!(breaker.allow(HOST));

        fail(&breaker, 1);
        assert!(!breaker.allow(HOST));
        assert_eq!(breaker.state(HOST), CircuitState::Open);
        assert_eq!(breaker.retry_after(HOST), Some(Duration::from_secs(60)));
        assert_eq!(breaker.stats(HOST).trips, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let breaker = breaker();
        fail(&breaker, 4);
        breaker.record_success(HOST);
        fail(&breaker, 4);
        assert!(breaker.allow(HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_expire() {
        let breaker = breaker();
        fail(&breaker, 4);
        tokio::time::advance(Duration::from_secs(31)).await;
        fail(&breaker, 1);
        assert!(breaker.allow(HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_cooldown_then_close() {
        let breaker = breaker();
        fail(&breaker, 5);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!breaker.allow(HOST));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.allow(HOST));
        assert_eq!(breaker.state(HOST), CircuitState::HalfOpen);
        assert!(!breaker.allow(HOST));
        assert!(!breaker.allow(HOST));

        breaker.record_success(HOST);
        assert_eq!(breaker.state(HOST), CircuitState::Closed);
        assert!(breaker.allow(HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let breaker = breaker();
        fail(&breaker, 5);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(breaker.allow(HOST));

        breaker.record_failure(HOST, FailureKind::RateLimited);
        assert_eq!(breaker.state(HOST), CircuitState::Open);
        assert!(!breaker.allow(HOST));
        assert_eq!(breaker.stats(HOST).trips, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_counted_separately() {
        let breaker = breaker();
        breaker.record_failure(HOST, FailureKind::RateLimited);
        breaker.record_failure(HOST, FailureKind::RateLimited);
        breaker.record_failure(HOST, FailureKind::Network);

        let stats = breaker.stats(HOST);
        assert_eq!(stats.rate_limited, 2);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let breaker = breaker();
        fail(&breaker, 5);
        assert!(!breaker.allow(HOST));
        assert!(breaker.allow("other.example.com"));
    }
}
