//! Time-bounded retry for storage requests.
//!
//! Storage operations are retried while the error is retryable and the total
//! time spent, including the next backoff, stays inside the budget. A zero
//! budget means a single attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::StorageError;

/// Default budget for listing operations.
pub const DEFAULT_OPERATION_RETRY: Duration = Duration::from_millis(1000);

/// Default budget for address resolution.
pub const DEFAULT_DOWNLOAD_RETRY: Duration = Duration::from_millis(1000);

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time allowed for all attempts.
    pub max_elapsed: Duration,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_RETRY)
    }
}

impl RetryPolicy {
    /// Create a policy with the given total budget.
    pub fn new(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Set the first backoff delay.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Delay before attempt `attempt + 1` (attempts count from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget
    /// runs out. The last error is returned on failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let started = Instant::now();
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "Storage request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    if started.elapsed() + delay > self.max_elapsed {
                        warn!(label, attempt, error = %e, "Storage retry budget exhausted");
                        return Err(e);
                    }
                    debug!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying storage request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
