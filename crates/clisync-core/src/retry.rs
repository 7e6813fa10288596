//! Bounded retry for operations that fail transiently.

use std::future::Future;
use std::time::Duration;

/// Attempts per index update and per connection.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` calls in total (at least one).
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: E },
}

impl<T, E> RetryOutcome<T, E> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// # Errors
    ///
    /// Returns the last error when every attempt failed.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Run `operation` until it succeeds or the policy's attempts are spent.
///
/// `on_failure` sees every failed attempt (1-based), including the last one.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
    mut on_failure: impl FnMut(u32, &E),
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) => {
                on_failure(attempt, &error);
                if attempt >= max_attempts {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    };
                }
            }
        }

        if !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_first_success_stops() {
        let calls = Cell::new(0);
        let outcome: RetryOutcome<u32, String> = retry(
            RetryPolicy::new(10),
            || {
                calls.set(calls.get() + 1);
                async { Ok(7) }
            },
            |_, _| panic!("no failures expected"),
        )
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Succeeded {
                value: 7,
                attempts: 1
            }
        ));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_failures_then_success() {
        let calls = Cell::new(0u32);
        let mut failures = Vec::new();
        let outcome = retry(
            RetryPolicy::new(10),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n <= 3 { Err(format!("boom {n}")) } else { Ok(n) } }
            },
            |attempt, err: &String| failures.push((attempt, err.clone())),
        )
        .await;

        assert_eq!(outcome.attempts(), 4);
        assert_eq!(outcome.into_result().unwrap(), 4);
        assert_eq!(
            failures,
            vec![
                (1, "boom 1".to_string()),
                (2, "boom 2".to_string()),
                (3, "boom 3".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let calls = Cell::new(0u32);
        let mut reported = 0;
        let outcome: RetryOutcome<(), u32> = retry(
            RetryPolicy::new(10),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(n) }
            },
            |_, _| reported += 1,
        )
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 10,
                last_error: 10
            }
        ));
        assert_eq!(calls.get(), 10);
        assert_eq!(reported, 10);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let outcome: RetryOutcome<(), &str> =
            retry(RetryPolicy::new(0), || async { Err("nope") }, |_, _| {}).await;
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::new(3).with_delay(Duration::from_millis(500));
        let outcome: RetryOutcome<(), ()> = retry(policy, || async { Err(()) }, |_, _| {}).await;

        assert_eq!(outcome.attempts(), 3);
        // Two waits: no sleep after the final failure
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }
}
