//! Bounded exponential backoff for rate-limited provider calls.
//!
//! Every external AI call in the crate passes through this wrapper exactly
//! once (`PromptServices` is the chokepoint). Only rate-limit-shaped errors
//! are retried; everything else propagates unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

pub async fn with_retry<T, F, Fut>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_config(operation, DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY).await
}

/// Run `operation` up to `max_attempts` times, sleeping `base_delay` before
/// the first retry and doubling it each time. No jitter.
pub async fn with_retry_config<T, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut remaining = max_attempts.max(1);
    let mut delay = base_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && remaining > 1 => {
                remaining -= 1;
                warn!(delay_ms = delay.as_millis() as u64, remaining, "rate limited, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn quota_error() -> Error {
        Error::provider(Some(429), Some("RESOURCE_EXHAUSTED".into()), "quota exceeded")
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limit_failures_then_success() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let value = with_retry(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(quota_error())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2000ms then 4000ms of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let err = with_retry::<(), _, _>(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::provider(Some(500), None, "boom")) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Provider { status: Some(500), .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_propagate_original_error() {
        let calls = AtomicU32::new(0);

        let err = with_retry::<(), _, _>(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(quota_error()) }
        })
        .await
        .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_attempt_budget() {
        let calls = AtomicU32::new(0);

        let _ = with_retry_config::<(), _, _>(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(quota_error()) }
            },
            5,
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
