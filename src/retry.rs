//! Bounded fixed-delay retry for repeat-safe operations.
//!
//! All sheet batch writes are convergent (re-issuing the same batch produces
//! the same cells), so wrapping them here is safe. Do not wrap operations
//! that are not safe to repeat.

use std::future::Future;
use std::time::Duration;

/// Retries an operation up to `max_retries` extra times with a fixed sleep
/// between attempts. The last error is returned unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub sleep_interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, sleep_interval: Duration) -> Self {
        Self {
            max_retries,
            sleep_interval,
        }
    }

    /// Run `op`, retrying on error. `op` is invoked at most
    /// `max_retries + 1` times.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt == self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    log::info!("Retry: {}, {} times, failed reason: {}", label, attempt, err);
                    tokio::time::sleep(self.sleep_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn always_failing_op_runs_max_retries_plus_one_times() {
        let calls = Cell::new(0u32);
        let result: Result<(), String> = instant_retry(3)
            .run("doomed", || async {
                calls.set(calls.get() + 1);
                Err("boom".to_string())
            })
            .await;

        assert_eq!(calls.get(), 4);
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = instant_retry(5)
            .run("flaky", || async {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(calls.get())
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn immediate_success_runs_once() {
        let calls = Cell::new(0u32);
        let result: Result<&str, String> = instant_retry(3)
            .run("fine", || async {
                calls.set(calls.get() + 1);
                Ok("done")
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 1);
    }
}
