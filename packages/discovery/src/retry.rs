//! Bounded retry with exponential backoff for idempotent reads.
//!
//! Only transient failures are worth retrying; validation and not-found
//! errors are deterministic and come back identical on every attempt, so
//! the caller supplies a predicate that decides which errors qualify.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry policy for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts total: the initial call plus retries after 50ms
    /// and 100ms.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before the given retry (1-based), doubling per attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `operation`, retrying while `is_transient` approves the error
    /// and the attempt budget lasts.
    ///
    /// The closure is called once per attempt to build a fresh future.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error immediately, or the last
    /// transient error once retries are exhausted.
    #[allow(clippy::future_not_send)]
    pub async fn run<T, E, F, Fut, P>(
        &self,
        op_name: &str,
        is_transient: P,
        operation: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                log::warn!(
                    "{op_name}: retry {attempt}/{max} in {delay:?}...",
                    max = self.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    log::warn!("{op_name}: transient error: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop exited without returning")
    }
}
