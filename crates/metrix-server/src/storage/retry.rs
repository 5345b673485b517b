//! Bounded exponential backoff for connect-time operations.
//!
//! Delays start at `initial`, double after each retryable failure and are
//! capped at `max_delay`. Each attempt is itself bounded by `max_delay` (or
//! by what is left of the budget, whichever is smaller). The loop gives up as
//! soon as the next wait would cross `budget`, so total wall time never
//! exceeds the budget. Permanent failures return immediately.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout, Instant};

use metrix_core::error::{MetrixError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max_delay: Duration,
    pub budget: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            budget: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier.max(1)).min(self.max_delay)
    }
}

/// Outcome classification of one failed attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Transient (connection refused, deadlock, serialization conflict).
    #[error("retryable: {0}")]
    Retryable(String),
    /// Retrying cannot help (bad credentials, bad syntax, unknown database).
    #[error("permanent: {0}")]
    Permanent(String),
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// Both failure exits map to [`MetrixError::Connect`].
pub async fn retry_with_backoff<T, F, Fut>(
    what: &str,
    policy: &BackoffPolicy,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let started = Instant::now();
    let mut delay = policy.initial;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let remaining = policy.budget.saturating_sub(started.elapsed());
        let outcome = match timeout(remaining.min(policy.max_delay), op()).await {
            Ok(res) => res,
            Err(_) => Err(AttemptError::Retryable("attempt timed out".into())),
        };

        let msg = match outcome {
            Ok(v) => {
                if attempt > 1 {
                    tracing::info!(what, attempt, "connected after retry");
                }
                return Ok(v);
            }
            Err(AttemptError::Permanent(msg)) => {
                tracing::error!(what, attempt, error = %msg, "permanent failure, not retrying");
                return Err(MetrixError::Connect(format!("{what}: {msg}")));
            }
            Err(AttemptError::Retryable(msg)) => msg,
        };

        if started.elapsed() + delay > policy.budget {
            tracing::error!(what, attempt, error = %msg, "retry budget exhausted");
            return Err(MetrixError::Connect(format!(
                "{what}: gave up after {attempt} attempts in {:?}: {msg}",
                started.elapsed()
            )));
        }

        tracing::warn!(
            what,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %msg,
            "attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy::default();
        let started = Instant::now();

        let v = retry_with_backoff("test", &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(AttemptError::Retryable(format!("deadlock #{n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(v, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let waited = started.elapsed();
        // 1s + 2s of backoff.
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
        assert!(waited <= policy.budget, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_fails_fast() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let err = retry_with_backoff("test", &BackoffPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AttemptError::Permanent("password authentication failed".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.client_code().as_str(), "CONNECT");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_budget_is_connect_error() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy::default();
        let started = Instant::now();

        let err = retry_with_backoff("test", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AttemptError::Retryable("connection refused".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.client_code().as_str(), "CONNECT");
        // Waits 1s, 2s, 4s; a further 5s would cross the 10s budget.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() <= policy.budget);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_is_bounded() {
        let policy = BackoffPolicy::default();
        let started = Instant::now();

        let err = retry_with_backoff("test", &policy, || async {
            std::future::pending::<std::result::Result<(), AttemptError>>().await
        })
        .await
        .unwrap_err();

        assert_eq!(err.client_code().as_str(), "CONNECT");
        assert!(started.elapsed() <= policy.budget);
    }

    #[test]
    fn delay_is_capped() {
        let p = BackoffPolicy::default();
        assert_eq!(p.next_delay(Duration::from_secs(4)), Duration::from_secs(5));
        assert_eq!(p.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
    }
}
