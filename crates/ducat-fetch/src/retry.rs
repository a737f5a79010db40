//! Retry budget and backoff schedule.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry budget for a single file request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum request attempts per file.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Fraction of the delay added or removed at random, in `[0, 1)`.
    pub jitter: f64,
    /// Timeout applied to each attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Maximum times a request waits for an open circuit before giving up.
    pub max_cooldown_waits: u32,
    /// Poll interval while another request is probing a half-open circuit, in milliseconds.
    pub probe_poll_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.25,
            attempt_timeout_ms: 60_000,
            max_cooldown_waits: 5,
            probe_poll_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Returns the half-open poll interval.
    #[must_use]
    pub const fn probe_poll(&self) -> Duration {
        Duration::from_millis(self.probe_poll_ms)
    }

    /// Returns the un-jittered delay after `attempt` failed attempts.
    ///
    /// Doubles from `base_delay_ms` and saturates at `max_delay_ms`.
    #[must_use]
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Returns the delay after `attempt` failed attempts, with random jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 0.99);
        if jitter == 0.0 {
            return nominal;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        nominal.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.max_cooldown_waits, 5);
    }

    #[test]
    fn test_nominal_delay_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.nominal_delay(1), Duration::from_millis(500));
        assert_eq!(config.nominal_delay(2), Duration::from_millis(1_000));
        assert_eq!(config.nominal_delay(4), Duration::from_millis(4_000));
        assert_eq!(config.nominal_delay(20), Duration::from_millis(30_000));
        assert_eq!(config.nominal_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_backoff_stays_within_jitter_band() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let delay = config.backoff(2).as_millis();
            assert!((750..=1250).contains(&delay), "delay {delay} outside band");
        }
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let config = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff(3), Duration::from_millis(2_000));
    }
}
