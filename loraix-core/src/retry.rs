//! Retry policy with exponential backoff.

use crate::error::LoraixError;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

/// Retry settings in effect for one call, as seen by a [`BackoffStrategy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub base_delay: Duration,
    pub max_retries: u32,
}

/// Decides how long to wait before the next attempt.
///
/// `attempt` is 1-indexed and refers to the attempt that just failed.
/// Returning `None` or a zero duration means "retry immediately".
pub trait BackoffStrategy: Send + Sync + Debug {
    fn compute_delay(
        &self,
        attempt: u32,
        error: &LoraixError,
        settings: &RetrySettings,
    ) -> Option<Duration>;

    /// Base delay reported to [`compute_delay`](Self::compute_delay)
    fn base_delay(&self) -> Duration {
        DEFAULT_BASE_DELAY
    }
}

/// `base_delay * 2^(attempt - 1)`, no jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff with the default 300ms base delay
    pub fn new() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn compute_delay(
        &self,
        attempt: u32,
        error: &LoraixError,
        settings: &RetrySettings,
    ) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(31);
        Some(settings.base_delay.saturating_mul(1u32 << exponent))
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Backoff computed by a caller-supplied closure
pub struct FnBackoff<F> {
    f: F,
    base_delay: Duration,
}

impl<F> FnBackoff<F>
where
    F: Fn(u32, &LoraixError, &RetrySettings) -> Option<Duration> + Send + Sync,
{
    /// Wrap a closure as a backoff strategy
    pub fn new(f: F) -> Self {
        Self {
            f,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Base delay handed to the closure
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

impl<F> Debug for FnBackoff<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackoff")
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl<F> BackoffStrategy for FnBackoff<F>
where
    F: Fn(u32, &LoraixError, &RetrySettings) -> Option<Duration> + Send + Sync,
{
    fn compute_delay(
        &self,
        attempt: u32,
        error: &LoraixError,
        settings: &RetrySettings,
    ) -> Option<Duration> {
        (self.f)(attempt, error, settings)
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Retry budget for one provider
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Arc<dyn BackoffStrategy>,
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(max_retries: u32, backoff: Arc<dyn BackoffStrategy>) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Maximum number of retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Settings handed to the backoff strategy
    pub fn settings(&self) -> RetrySettings {
        RetrySettings {
            base_delay: self.backoff.base_delay(),
            max_retries: self.max_retries,
        }
    }

    /// Whether an error warrants another attempt
    pub fn should_retry(&self, error: &LoraixError) -> bool {
        error.is_retryable()
    }

    /// Decide whether the attempt that just failed gets a successor.
    ///
    /// Returns `false` when the budget of `max_retries + 1` attempts is spent
    /// or the error is permanent. Otherwise sleeps for the backoff delay and
    /// returns `true`.
    pub async fn pause_before_retry(&self, attempt: u32, error: &LoraixError) -> bool {
        if attempt > self.max_retries || !self.should_retry(error) {
            return false;
        }

        let delay = self
            .backoff
            .compute_delay(attempt, error, &self.settings())
            .filter(|d| !d.is_zero());
        tracing::warn!(
            attempt,
            max_retries = self.max_retries,
            delay = ?delay,
            error = %error,
            "attempt failed, retrying"
        );

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        true
    }

    /// Execute `operation` until it succeeds, fails permanently, or the
    /// budget is spent. The operation receives the 1-indexed attempt number.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, LoraixError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LoraixError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !self.pause_before_retry(attempt, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Arc::new(ExponentialBackoff::new()))
    }
}
