use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Retry with exponential backoff while `retryable` accepts the error.
    /// The first error it rejects is returned right away.
    pub async fn retry_if<F, Fut, T, E, P>(&self, operation_name: &str, mut f: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !retryable(&e) => {
                    warn!(operation = operation_name, error = %e, "Operation failed, not retryable");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::new(3, 1, 2);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<usize, String> = policy
            .retry_if(
                "flaky",
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err(format!("attempt {}", n)) } else { Ok(n) }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 1, 1);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> = policy
            .retry_if(
                "down",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("unavailable".to_string())
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, 1, 1);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> = policy
            .retry_if(
                "auth",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("401".to_string())
                },
                |e| e != "401",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
