//! Explicit retry policy for generation jobs: bounded attempts with
//! exponential backoff. What happens after exhaustion (dead-lettering) is up
//! to the caller, which receives the attempt count and the last error.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sleep before attempt `attempt + 1`, after `attempt` failures (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, returns a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number;
    /// success yields the value with the attempt that produced it.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut op: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<(T, u32), RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{label}: attempt {attempt}/{max_attempts} failed ({e}); retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
        assert_eq!(p.delay_after(3), Duration::from_secs(5));
        assert_eq!(p.delay_after(40), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy(3)
            .run(
                "test",
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err("flaky")
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap(), (3, 3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s after the first failure, 4s after the second
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts_and_last_error() {
        let result: Result<((), u32), _> = policy(2)
            .run(
                "test",
                |attempt| async move { Err(format!("failure {attempt}")) },
                |_| true,
            )
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.last_error, "failure 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), _> = policy(5)
            .run(
                "test",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("unauthorized") }
                },
                |e| *e != "unauthorized",
            )
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
