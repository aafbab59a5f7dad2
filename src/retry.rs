//! Exponential backoff for rate-limited hosted calls made by the indexer.

use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;

/// Delay schedule for retrying a rate-limited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Total attempts, including the first call.
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Schedule for embedding calls: 1s doubling, capped at 30s.
    pub const EMBEDDING: Self = Self {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        max_attempts: 6,
    };

    /// Schedule for page reader calls: 2s doubling, capped at 60s.
    pub const READER: Self = Self {
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(60),
        max_attempts: 6,
    };

    /// Un-jittered doubling schedule. Attempts are bounded by `max_attempts`, not elapsed time.
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Run `operation`, retrying while `should_retry` accepts the error and attempts remain.
///
/// The last error is returned once the policy is exhausted or an error is not retryable.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: BackoffPolicy,
    label: &str,
    should_retry: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let should_retry = &should_retry;
    let mut attempt = 0u32;

    backoff::future::retry_notify(
        policy.to_backoff(),
        move || {
            attempt += 1;
            let exhausted = attempt >= max_attempts;
            let call = operation();
            async move {
                call.await.map_err(|error| {
                    if exhausted || !should_retry(&error) {
                        backoff::Error::permanent(error)
                    } else {
                        backoff::Error::transient(error)
                    }
                })
            }
        },
        |error: E, delay: Duration| {
            tracing::warn!(
                operation = label,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after backoff"
            );
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: BackoffPolicy = BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_attempts: 4,
    };

    #[test]
    fn delays_double_and_cap() {
        let mut schedule = BackoffPolicy::EMBEDDING.to_backoff();
        let delays: Vec<Duration> = (0..7).filter_map(|_| schedule.next_backoff()).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 8, 16, 30, 30].map(Duration::from_secs).to_vec()
        );

        let mut reader = BackoffPolicy::READER.to_backoff();
        let last = (0..10).filter_map(|_| reader.next_backoff()).last();
        assert_eq!(last, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = retry_with_backoff(
            FAST,
            "test",
            |_| true,
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err("rate limited".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            FAST,
            "test",
            |error: &String| error == "retry",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;
        assert_eq!(result, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            FAST,
            "test",
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("rate limited".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
