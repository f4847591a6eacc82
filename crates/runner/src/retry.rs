//! Retry with exponential back-off for backend round-trips.
//!
//! Only the round-trip itself is retried. Tool calls executed earlier in the
//! same turn are carried in the request's exchanges and are never re-run.

use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use pipeline::{BackendError, RetryPolicy};
use tracing::{debug, warn};

use crate::config::RetryConfig;

impl RetryConfig {
    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval())
            .with_max_interval(self.max_interval())
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor.clamp(0.0, 1.0))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Runs `operation` until it succeeds, fails non-retryably, or the retry
/// budget is spent.
///
/// Returns the final result together with the number of attempts made
/// (always at least one).
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> (Result<T, BackendError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut backoff = config.build_backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return (Ok(value), attempt);
            }
            Err(e) => e,
        };

        let hint = match error.retry_policy() {
            RetryPolicy::NonRetryable => {
                debug!(operation = operation_name, error = %error, "Non-retryable error");
                return (Err(error), attempt);
            }
            RetryPolicy::Retryable { after } => after,
        };

        if attempt > config.max_retries {
            warn!(
                operation = operation_name,
                attempt,
                max_retries = config.max_retries,
                error = %error,
                "Retry budget exhausted"
            );
            return (Err(error), attempt);
        }

        let scheduled = backoff.next_backoff().unwrap_or_else(|| config.max_interval());
        let wait = hint.map_or(scheduled, |after| after.max(scheduled));
        warn!(
            operation = operation_name,
            attempt,
            wait_ms = duration_millis(wait),
            error = %error,
            "Retrying after backoff"
        );
        tokio::time::sleep(wait).await;
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
