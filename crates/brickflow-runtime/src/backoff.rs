//! Retry with jittered backoff.
//!
//! The delay schedule is a [`BackoffPolicy`] with full jitter applied: each
//! retry sleeps for a uniformly random duration up to the policy's delay for
//! that attempt, so a burst of failing callers does not resubmit in lockstep.
//! The first attempt is never delayed, and cancellation both interrupts the
//! sleep and is never itself retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use brickflow_types::{BrickError, Result};

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the full (un-jittered) delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = base.as_millis() as u64 * 2u64.saturating_pow(attempt as u32);
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }

    /// Sample a jittered delay: uniform over `[0, delay_for_attempt]`.
    pub fn jittered_delay(&self, attempt: usize) -> Duration {
        let full = self.delay_for_attempt(attempt);
        if full.is_zero() {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(0..=full.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Run `f` up to `max_attempts` times.
///
/// Retries only on errors accepted by `should_retry`; cancellation always
/// propagates immediately (a cancelled attempt is not a failed attempt to
/// retry). Once attempts are exhausted the last observed error is re-raised.
pub async fn run_with_retry<T, F, Fut, P>(
    f: F,
    max_attempts: usize,
    policy: &BackoffPolicy,
    should_retry: P,
    cancel: &CancellationToken,
    label: &str,
) -> Result<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&BrickError) -> bool,
{
    let mut last_error = None;
    for attempt in 0..max_attempts {
        if attempt > 0 {
            let delay = policy.jittered_delay(attempt - 1);
            tracing::info!(brick = %label, attempt, delay_ms = %delay.as_millis(), "Retrying");
            tokio::select! {
                _ = cancel.cancelled() => return Err(BrickError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) if should_retry(&e) && attempt + 1 < max_attempts => {
                tracing::warn!(brick = %label, attempt, error = %e, "Attempt failed, will retry");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error.unwrap_or_else(|| BrickError::RetriesExhausted {
        brick: label.to_string(),
        attempts: max_attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    // Fails `failures` times, then succeeds.
    fn flaky(
        calls: Arc<AtomicUsize>,
        failures: usize,
    ) -> impl Fn(usize) -> std::pin::Pin<Box<dyn Future<Output = Result<u32>> + Send>> {
        move |_attempt| {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(BrickError::Other(format!("failure {n}")))
                } else {
                    Ok(99)
                }
            })
        }
    }

    #[tokio::test]
    async fn succeeds_after_k_failures_with_exactly_k_plus_one_calls() {
        let calls = counter();
        let result = run_with_retry(
            flaky(calls.clone(), 2),
            5,
            &BackoffPolicy::None,
            |e| e.is_recoverable(),
            &CancellationToken::new(),
            "flaky",
        )
        .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_re_raise_last_error() {
        let calls = counter();
        let result = run_with_retry(
            flaky(calls.clone(), 10),
            3,
            &BackoffPolicy::None,
            |e| e.is_recoverable(),
            &CancellationToken::new(),
            "flaky",
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_matching_error_is_not_retried() {
        let calls = counter();
        let calls2 = calls.clone();
        let result: Result<u32> = run_with_retry(
            move |_| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BrickError::Business {
                        brick: "b".into(),
                        message: "permanent".into(),
                    })
                }
            },
            5,
            &BackoffPolicy::None,
            |e| e.to_string().contains("transient"),
            &CancellationToken::new(),
            "b",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_is_never_retried() {
        let calls = counter();
        let calls2 = calls.clone();
        let result: Result<u32> = run_with_retry(
            move |_| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BrickError::Cancelled)
                }
            },
            5,
            &BackoffPolicy::None,
            |_| true,
            &CancellationToken::new(),
            "b",
        )
        .await;

        assert!(matches!(result.unwrap_err(), BrickError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_backoff_sleep() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = counter();
        let result = run_with_retry(
            flaky(calls.clone(), 10),
            3,
            &BackoffPolicy::Fixed(Duration::from_secs(3600)),
            |_| true,
            &cancel,
            "slow",
        )
        .await;

        // First attempt runs (no delay), then the pre-retry sleep observes
        // the already-fired signal.
        assert!(matches!(result.unwrap_err(), BrickError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_the_full_delay() {
        let policy = BackoffPolicy::Fixed(Duration::from_millis(50));
        for _ in 0..100 {
            assert!(policy.jittered_delay(0) <= Duration::from_millis(50));
        }
        assert_eq!(BackoffPolicy::None.jittered_delay(5), Duration::ZERO);
    }
}
