// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wait periods between operation status polls.
//!
//! The orchestrator owns the poll loop; a [`PollingBackoffPolicy`] only
//! decides how long to sleep after each unfinished poll. The total wait is
//! bounded separately by the deploy's `max_wait`.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::error::ConfigurationError;

/// Decides the delay before the next status poll.
pub trait PollingBackoffPolicy: Send + Sync + Debug {
    /// Returns the delay after `attempt_count` unfinished polls.
    ///
    /// Always called after the first attempt, so `attempt_count >= 1`.
    fn wait_period(&self, loop_start: Instant, attempt_count: u32) -> Duration;
}

/// Polls at a constant interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval(Duration);

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self(interval)
    }
}

impl PollingBackoffPolicy for FixedInterval {
    fn wait_period(&self, _loop_start: Instant, _attempt_count: u32) -> Duration {
        self.0
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoffBuilder {
    /// Creates a builder with the default parameters: 1s initial, 5s cap, x1.5.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(5),
            scaling: 1.5,
        }
    }

    pub fn with_initial_delay(mut self, v: Duration) -> Self {
        self.initial_delay = v;
        self
    }

    pub fn with_maximum_delay(mut self, v: Duration) -> Self {
        self.maximum_delay = v;
        self
    }

    pub fn with_scaling(mut self, v: f64) -> Self {
        self.scaling = v;
        self
    }

    /// Validates the parameters and creates the policy.
    pub fn build(self) -> Result<ExponentialBackoff, ConfigurationError> {
        if !(self.scaling >= 1.0) {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "polling.scaling",
                value: self.scaling.to_string(),
                reason: "Scaling factor must be at least 1.0".to_string(),
            });
        }
        if self.initial_delay.is_zero() {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "polling.initial_delay_ms",
                value: "0".to_string(),
                reason: "Initial delay must be greater than 0".to_string(),
            });
        }
        if self.maximum_delay < self.initial_delay {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "polling.maximum_delay_ms",
                value: self.maximum_delay.as_millis().to_string(),
                reason: format!(
                    "Maximum delay must not be below the initial delay ({}ms)",
                    self.initial_delay.as_millis()
                ),
            });
        }
        Ok(ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            scaling: self.scaling,
        })
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncated exponential backoff without jitter.
///
/// A single client polls a single operation, so there is no herd to spread.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoff {
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn maximum_delay(&self) -> Duration {
        self.maximum_delay
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(5),
            scaling: 1.5,
        }
    }
}

impl PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, _loop_start: Instant, attempt_count: u32) -> Duration {
        // Delay after the n-th poll is initial * scaling^(n-1), capped.
        let steps = attempt_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.initial_delay.as_secs_f64() * self.scaling.powi(steps);
        let cap_secs = self.maximum_delay.as_secs_f64();
        if delay_secs.is_finite() && delay_secs < cap_secs {
            Duration::from_secs_f64(delay_secs)
        } else {
            self.maximum_delay
        }
    }
}
