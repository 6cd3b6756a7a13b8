//! Consistency-aware retry combinators.
//!
//! The system under test is allowed to be mid-failover or mid-replication
//! while a scenario drives load through it. These combinators mask that
//! non-determinism so assertions stay deterministic: transient errors are
//! retried up to an attempt budget and the final outcome is always a plain
//! `Result` — the combinator owns attempt counting and final propagation.

use faultline_config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Attempt budget and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy for writes racing a failover.
    pub fn writes(config: &RetryConfig) -> Self {
        Self::new(config.write_attempts, config.delay())
    }

    /// Policy for reads waiting out replication lag.
    pub fn reads(config: &RetryConfig) -> Self {
        Self::new(config.read_attempts, config.delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::writes(&RetryConfig::default())
    }
}

/// Retries `op` on any error, treating every failure as transient.
///
/// Used where a write should eventually succeed once the system under test
/// establishes a new path. The last error is propagated when the budget is
/// exhausted, never swallowed.
pub async fn retry_write<T, E, F, Fut>(op: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_transient("write", op, policy).await
}

/// Retries `op` on connectivity-level errors only; the first `Ok` wins.
///
/// A result that does not yet reflect the expected state (a key still absent
/// under eventual consistency, say) is returned as-is — semantic
/// non-convergence is the caller's business. Use [`retry_read_until`] to
/// also wait for convergence.
pub async fn retry_read<T, E, F, Fut>(op: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_transient("read", op, policy).await
}

/// Retries `op` until `converged` accepts an `Ok` result or the budget is
/// exhausted, then returns the last observed result.
pub async fn retry_read_until<T, E, F, Fut, P>(
    mut op: F,
    mut converged: P,
    policy: RetryPolicy,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = op().await;

        match &result {
            Ok(value) if converged(value) => return result,
            Ok(_) if attempt < policy.max_attempts => {
                debug!(attempt, "read has not converged; retrying");
            }
            Err(err) if attempt < policy.max_attempts => {
                debug!(attempt, error = %err, "read attempt failed; retrying");
            }
            _ => return result,
        }

        sleep(policy.delay).await;
    }
}

async fn retry_transient<T, E, F, Fut>(kind: &str, mut op: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                debug!(kind, attempt, error = %err, "attempt failed; retrying");
                sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::future::ready;

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn write_succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);

        let result = retry_write(
            || {
                calls.set(calls.get() + 1);
                ready(if calls.get() < 3 { Err("connection reset") } else { Ok(calls.get()) })
            },
            quick(5),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn write_propagates_the_last_error() {
        let calls = Cell::new(0u32);

        let result: Result<(), &str> = retry_write(
            || {
                calls.set(calls.get() + 1);
                ready(Err("still down"))
            },
            quick(4),
        )
        .await;

        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn read_returns_first_ok_even_if_semantically_absent() {
        let result: Result<Option<u32>, &str> = retry_read(|| ready(Ok(None)), quick(5)).await;

        // absence is an answer, not an error
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn read_until_waits_for_convergence() {
        let calls = Cell::new(0u32);

        let result: Result<Option<u32>, &str> = retry_read_until(
            || {
                calls.set(calls.get() + 1);
                ready(Ok(if calls.get() < 4 { None } else { Some(7) }))
            },
            Option::is_some,
            quick(10),
        )
        .await;

        assert_eq!(result.unwrap(), Some(7));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn read_until_returns_last_observed_result_on_exhaustion() {
        let calls = Cell::new(0u32);

        let result: Result<Option<u32>, &str> = retry_read_until(
            || {
                calls.set(calls.get() + 1);
                ready(Ok(None))
            },
            Option::is_some,
            quick(3),
        )
        .await;

        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn read_until_also_masks_transient_errors() {
        let calls = Cell::new(0u32);

        let result: Result<Option<u32>, &str> = retry_read_until(
            || {
                calls.set(calls.get() + 1);
                ready(match calls.get() {
                    1 => Err("connection refused"),
                    2 => Ok(None),
                    _ => Ok(Some(1)),
                })
            },
            Option::is_some,
            quick(5),
        )
        .await;

        assert_eq!(result.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn zero_attempt_policy_still_runs_once() {
        let calls = Cell::new(0u32);

        let result: Result<u32, &str> = retry_write(
            || {
                calls.set(calls.get() + 1);
                ready(Ok(41))
            },
            RetryPolicy::new(0, Duration::from_millis(1)),
        )
        .await;

        assert_eq!(result.unwrap(), 41);
        assert_eq!(calls.get(), 1);
    }
}
