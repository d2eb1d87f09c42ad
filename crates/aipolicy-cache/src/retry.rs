//! Bounded, fixed-backoff retry with a per-attempt timeout.
//!
//! Every failure is retried: the cache only asks for retries when it has
//! no previous value to fall back on, so giving up early would surface an
//! error that a second attempt might have avoided.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::CacheError;

/// Runs `operation` up to `1 + max_retries` times, bounding each attempt by
/// `timeout` and sleeping `backoff` between attempts.
pub(crate) async fn fetch_with_retry<T, E, F, Fut>(
    key: &str,
    max_retries: u32,
    backoff: Duration,
    timeout: Duration,
    operation: F,
) -> Result<T, CacheError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CacheError::Fetch {
                key: key.to_owned(),
                attempts: attempt,
                message: e.to_string(),
            },
            Err(_) => CacheError::Timeout {
                key: key.to_owned(),
                attempts: attempt,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        if attempt > max_retries {
            return Err(err);
        }

        tracing::warn!(
            key,
            attempt,
            max_retries,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "cache fetch failed; retrying after backoff"
        );
        tokio::time::sleep(backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    const FAST: Duration = Duration::from_millis(0);
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = fetch_with_retry("k", 2, FAST, TIMEOUT, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, String>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = fetch_with_retry("k", 2, FAST, TIMEOUT, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("boom".to_owned())
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = fetch_with_retry("countries", 2, FAST, TIMEOUT, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>("network down")
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 attempt + 2 retries");
        assert_eq!(
            result.unwrap_err(),
            CacheError::Fetch {
                key: "countries".to_owned(),
                attempts: 3,
                message: "network down".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn zero_retries_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = fetch_with_retry("k", 0, FAST, TIMEOUT, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>("nope")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let result = fetch_with_retry("slow", 0, FAST, Duration::from_millis(20), || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<u32, String>(1)
        })
        .await;
        assert!(
            matches!(result, Err(CacheError::Timeout { attempts: 1, timeout_ms: 20, .. })),
            "got: {result:?}"
        );
    }
}
