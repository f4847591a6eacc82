//! Runner configuration.
//!
//! All timeouts and budgets are configurable so the same engine can be tuned
//! for a slow hosted model or a fast local one. Durations are stored as
//! milliseconds so the config round-trips through JSON files unchanged.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential back-off settings for transient backend failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    /// Jitter applied to every interval, in `[0.0, 1.0]`.
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval_ms: 500,
            max_interval_ms: 30_000,
            multiplier: 2.0,
            randomization_factor: 0.5,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

/// Engine-wide execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Deadline for a single backend round-trip.
    pub call_timeout_ms: u64,

    pub retry: RetryConfig,

    /// Tool round-trips allowed in one worker turn before the task fails.
    pub max_tool_rounds: u32,

    /// Upper bound on concurrently executing tasks under the
    /// dependency-ordered policy. Ignored for sequential pipelines.
    pub max_concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 120_000,
            retry: RetryConfig::default(),
            max_tool_rounds: 25,
            max_concurrency: 4,
        }
    }
}

impl RunnerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
