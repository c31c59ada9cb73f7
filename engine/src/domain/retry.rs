//! Bounded retry with exponential backoff.
//!
//! Shared by the audit subscriber and the effect worker. Sleeping and jitter
//! sit behind traits so tests can run retries instantly and
//! deterministically.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Attempt budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Build a policy; at least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Total attempts including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    #[must_use]
    pub const fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`, before jitter.
    ///
    /// Doubles from the initial backoff and is capped at the maximum.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use engine::domain::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(5, Duration::from_millis(200), Duration::from_secs(1));
    /// assert_eq!(policy.base_delay(1), Duration::from_millis(200));
    /// assert_eq!(policy.base_delay(3), Duration::from_millis(800));
    /// assert_eq!(policy.base_delay(4), Duration::from_secs(1));
    /// ```
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2_u32.saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Async sleeping abstraction for retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return a jittered delay derived from `base`.
    fn jittered_delay(&self, base: Duration) -> Duration;
}

/// Adds up to a quarter of the base delay at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl BackoffJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Leaves delays untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jittered_delay(&self, base: Duration) -> Duration {
        base
    }
}
