//! Sequential retry wrapper

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Successful output of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub result: T,
    /// Attempts made, including the successful one (1 = no retry needed)
    pub attempts: u32,
}

/// Invoke `operation`, re-invoking it up to `retries` more times on failure
///
/// Attempts run strictly one after another, separated by `delay` (zero fires
/// the next attempt immediately). Once the budget is spent the last error is
/// returned as is; the caller knows that `retries + 1` attempts were made.
pub async fn with_retry<T, E, F, Fut>(
    label: &str,
    retries: u32,
    delay: Duration,
    mut operation: F,
) -> Result<Retried<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return Ok(Retried { result, attempts }),
            Err(e) if attempts <= retries => {
                debug!(label, attempt = attempts, error = %e, "Attempt failed, retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let calls = Cell::new(0);
        let outcome = with_retry("ok", 3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            async { Ok::<_, String>("done") }
        })
        .await
        .unwrap();

        assert_eq!(outcome, Retried { result: "done", attempts: 1 });
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = Cell::new(0);
        let outcome = with_retry("flaky", 2, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 3 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result, 3);
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let calls = Cell::new(0);
        let err = with_retry("broken", 2, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move { Err::<(), _>(format!("failure {attempt}")) }
        })
        .await
        .unwrap_err();

        assert_eq!(err, "failure 3");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = Cell::new(0);
        let result = with_retry("once", 0, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("nope") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = Cell::new(0);
        let _ = with_retry("delayed", 2, Duration::from_millis(100), || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("nope") }
        })
        .await;

        assert_eq!(calls.get(), 3);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
