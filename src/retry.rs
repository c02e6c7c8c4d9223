//! Per-webhook retry configuration and backoff scheduling

use crate::error::WebhookError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration carried by each webhook
///
/// A failed delivery is retried with exponentially growing delays:
/// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`. The
/// scheduler itself never sleeps — it computes the delay the delivery
/// queue uses to re-enqueue the task no earlier than `now + delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on the delay between retries
    pub max_delay: Duration,

    /// Backoff growth factor, must be >= 1
    pub multiplier: f64,

    /// Per-attempt HTTP timeout
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a configuration that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a configuration with a fixed delay between retries
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            ..Default::default()
        }
    }

    /// Validate the configuration invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_delay < self.initial_delay {
            return Err(WebhookError::InvalidRetryConfig(format!(
                "max_delay {:?} is less than initial_delay {:?}",
                self.max_delay, self.initial_delay
            )));
        }
        if self.multiplier < 1.0 {
            return Err(WebhookError::InvalidRetryConfig(format!(
                "multiplier {} is less than 1",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Delay before the attempt following `attempt`
    ///
    /// `attempt` is the 1-based attempt number that just failed. Delays are
    /// non-decreasing and never exceed `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }

    /// Whether the failed `attempt` still leaves retry budget
    ///
    /// The budget is one initial attempt plus `max_retries` retries, so
    /// attempt N may be retried while `N <= max_retries`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}
