//! Capped exponential backoff for realtime reconnects

use crate::infra::config::Config;
use std::time::Duration;

/// Doubling delay between `initial` and `max`, giving up after
/// `max_attempts` consecutive failures. `reset` after a successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self { initial, max: max.max(initial), max_attempts, attempt: 0 }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.reconnect_initial_backoff(),
            config.reconnect_max_backoff(),
            config.reconnect_max_attempts(),
        )
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt.min(31)).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        self.attempt += 1;
        Some(delay)
    }

    /// Attempts consumed since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
