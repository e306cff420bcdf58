//! Retry policy and the backoff combinator used around provider calls.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tracing::warn;

use super::GenerationError;

/// How a single generation request is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound for exponential delays.
    pub max_delay: Duration,
    /// Fixed wait after a 429.
    pub rate_limit_cooldown: Duration,
    /// Extra factor applied to the backoff after a 5xx.
    pub server_error_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            rate_limit_cooldown: Duration::from_secs(20),
            server_error_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Policy without any waiting, for tests.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
            server_error_factor: 1.0,
        }
    }

    /// `base_delay * multiplier^attempt`, capped at `max_delay`.
    /// `attempt` is zero-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        scaled(self.base_delay, factor).min(self.max_delay)
    }

    /// Wait before retrying after `error` ended attempt number `attempt`.
    pub fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        match error {
            GenerationError::RateLimited => self.rate_limit_cooldown,
            GenerationError::Server(_) => {
                scaled(self.backoff(attempt), self.server_error_factor).min(self.max_delay)
            }
            _ => self.backoff(attempt),
        }
    }
}

fn scaled(duration: Duration, factor: f64) -> Duration {
    if !factor.is_finite() || factor <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// The retry budget ran out.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s)")]
pub struct RetryExhausted {
    pub attempts: u32,
    #[source]
    pub last: GenerationError,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. The closure receives the zero-based
/// attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let attempts = attempt + 1;
                if !err.is_retryable() || attempts >= max_attempts {
                    return Err(RetryExhausted {
                        attempts,
                        last: err,
                    });
                }
                let delay = policy.delay_for(attempt, &err);
                warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, error = %err, "generation attempt failed; retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.backoff(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000]);
    }

    #[test]
    fn rate_limits_and_server_errors_have_their_own_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(0, &GenerationError::RateLimited),
            Duration::from_secs(20)
        );
        assert_eq!(
            policy.delay_for(1, &GenerationError::Server(502)),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay_for(3, &GenerationError::Server(502)),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.delay_for(1, &GenerationError::Malformed("x".into())),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryPolicy::immediate(5), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GenerationError::Server(500))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(&RetryPolicy::immediate(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(GenerationError::RateLimited) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(&RetryPolicy::immediate(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(GenerationError::Config("missing key".into())) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
