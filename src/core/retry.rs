//! Retry helper for transient failures in async operations
//!
//! Only failures the caller classifies as transient are retried; anything
//! else is returned on the first attempt.

use std::time::Duration;
use tokio::time::sleep;

/// Configurable retry policy for async operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Execute an async operation, retrying while `is_transient` approves the error
///
/// # Examples
/// ```rust
/// use repoharvest::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<u32, String> {
/// let value = retry_async(
///     "list builds",
///     &RetryPolicy::default(),
///     |_err: &String| true,
///     || async { Ok::<u32, String>(7) },
/// )
/// .await?;
/// # Ok(value)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= attempts || !is_transient(&error) {
                    return Err(error);
                }
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quick(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_immediately() {
        let result = retry_async("op", &quick(3), |_: &String| true, || async {
            Ok::<i32, String>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = retry_async("op", &quick(3), |_: &&str| true, || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = retry_async("op", &quick(5), |_: &&str| false, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, &str>("bad token")
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "bad token");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = retry_async("op", &quick(2), |_: &&str| true, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, &str>("persistent failure")
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
