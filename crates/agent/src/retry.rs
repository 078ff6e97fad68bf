//! Bounded exponential backoff with jitter.
//!
//! Attempt `i` (0-indexed) that fails with a retryable error is followed by
//! a wait of `min(max_delay, base_delay * 2^i)` plus uniform jitter in
//! `[0, 10%)` of that delay. No wait follows the final failure. Total
//! attempts are `max_retries + 1`, strictly sequential.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Jitter ceiling as a fraction of the backoff delay.
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff before jitter: `min(max_delay, base_delay * 2^attempt)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let jitter = rand::rng().random_range(0.0..JITTER_FRACTION);
        delay + delay.mul_f64(jitter)
    }

    /// Run `op` on the current thread, sleeping between attempts.
    ///
    /// `op` receives the 0-indexed attempt number. Errors for which
    /// `retryable` returns false are returned immediately.
    pub fn run_blocking<T, E, F, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_retries || !retryable(&e) => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt = attempt + 1, max_retries = self.max_retries, ?delay, error = %e, "Retrying after failure");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Async counterpart of [`RetryPolicy::run_blocking`], waiting on the tokio timer.
    pub async fn run<T, E, F, Fut, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_retries || !retryable(&e) => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt = attempt + 1, max_retries = self.max_retries, ?delay, error = %e, "Retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Retry an async operation. See [`RetryPolicy::run`].
pub async fn with_retry<T, E, F, Fut, R>(
    op: F,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retryable: R,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    RetryPolicy::new(max_retries, base_delay, max_delay)
        .run(op, retryable)
        .await
}

/// Retry a blocking operation. See [`RetryPolicy::run_blocking`].
pub fn with_retry_blocking<T, E, F, R>(
    op: F,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retryable: R,
) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    RetryPolicy::new(max_retries, base_delay, max_delay).run_blocking(op, retryable)
}
