//! Reconnect backoff with optional jitter.
//!
//! The delay before reconnect attempt `n` (1-based) is
//! `min(initial * multiplier^(n-1), max)`, then spread by `±jitter`.
//! With the default config (5 s, multiplier 1.0, no jitter) every retry
//! waits a flat five seconds.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Stateless retry policy: computes the next delay given the failure count.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    /// Returns `None` once the failure budget is spent.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || self.is_exhausted(failures) {
            return None;
        }
        let base_ms = self.config.initial_delay_ms as f64
            * self.config.multiplier.powi(failures.saturating_sub(1) as i32);
        let capped = base_ms.min(self.config.max_delay_ms as f64);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let total_ms = if jitter > 0.0 {
            let spread = capped * jitter;
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };

        Some(Duration::from_millis(total_ms.max(0.0) as u64))
    }

    /// `true` once `failures` consecutive failures reach `max_attempts`.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.config.max_attempts
    }
}
