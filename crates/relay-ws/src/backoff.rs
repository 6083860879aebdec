//! Reauthentication backoff policy.
//!
//! The attempt counter increments on every failed token acquisition and
//! resets to its floor on any success. Delays grow exponentially from the
//! floor and are capped; the first failure already produces a non-zero
//! delay. No jitter: the delay sequence between successes must be strictly
//! increasing until the cap.

use std::time::Duration;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub floor: Duration,
    /// Maximum delay between attempts.
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Retry-attempt counter with exponential delay.
#[derive(Debug)]
pub struct ReauthBackoff {
    config: BackoffConfig,
    attempts: u32,
}

impl ReauthBackoff {
    /// Create a fresh backoff at the floor.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Record a failed attempt and return the delay before the next one.
    ///
    /// Delay: floor * 2^(attempt-1), capped at max.
    /// attempt=1 -> floor, attempt=2 -> 2*floor, attempt=3 -> 4*floor, ...
    pub fn record_failure(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let exponent = self.attempts.saturating_sub(1).min(10);
        let floor_ms = self.config.floor.as_millis() as u64;
        let max_ms = self.config.max.as_millis() as u64;
        let delay_ms = floor_ms.saturating_mul(1u64 << exponent).min(max_ms);
        Duration::from_millis(delay_ms)
    }

    /// Reset to the floor after a successful acquisition.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
