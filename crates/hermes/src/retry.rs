//! Retry policies with linear and exponential backoff.
//!
//! Adapters retry transient failures with a linear schedule (`base * attempt`);
//! the outbox consumer escalates with an exponential schedule before a message
//! is forwarded to the dead-letter topic.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};

/// Default number of retry attempts for adapter calls
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff growth mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// `initial * attempt` (attempt is 1-based)
    Linear,
    /// `initial * multiplier^attempt`, capped at `max_backoff`
    Exponential,
}

/// Retry policy for I/O-bearing calls.
///
/// # Example
///
/// ```
/// use hermes::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(5)
///     .with_initial_backoff(Duration::from_millis(200));
/// assert_eq!(policy.max_retries, 5);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound applied to any computed delay
    pub max_backoff: Duration,
    /// Growth factor for exponential backoff
    pub multiplier: f64,
    /// Backoff growth mode
    pub kind: BackoffKind,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Exponential backoff starting at 100ms, doubling, capped at 30s.
    #[must_use]
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            kind: BackoffKind::Exponential,
            jitter: false,
        }
    }

    /// Linear backoff: delay grows as `initial * attempt`.
    #[must_use]
    pub fn linear(max_retries: u32, initial: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff: initial,
            max_backoff: Duration::from_secs(60),
            multiplier: 1.0,
            kind: BackoffKind::Linear,
            jitter: false,
        }
    }

    /// Exponential backoff with jitter to avoid thundering herds.
    #[must_use]
    pub fn exponential_jitter(max_retries: u32) -> Self {
        let mut policy = Self::exponential(max_retries);
        policy.jitter = true;
        policy
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// Non-decreasing in `attempt` and never exceeds `max_backoff`.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.kind {
            BackoffKind::Linear => self.initial_backoff.saturating_mul(attempt),
            BackoffKind::Exponential => {
                let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
                let millis = self.initial_backoff.as_millis() as f64 * factor;
                if millis >= self.max_backoff.as_millis() as f64 {
                    return self.max_backoff;
                }
                Duration::from_millis(millis as u64)
            }
        };
        raw.min(self.max_backoff)
    }

    fn sleep_for(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        if self.jitter {
            let jitter_ms = (base.as_millis() as f64 * 0.1) as u64;
            if jitter_ms > 0 {
                return base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
            }
        }
        base
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// policy's retry budget is exhausted.
///
/// # Example
///
/// ```
/// use hermes::retry::{with_retry, RetryPolicy};
/// use hermes::error::Error;
///
/// # async fn example() -> Result<(), Error> {
/// let policy = RetryPolicy::exponential(3);
/// let value = with_retry(&policy, || async { Ok::<_, Error>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.sleep_for(attempt);
                debug!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
