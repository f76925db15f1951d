// Retry with exponential backoff for transient provider failures

use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY_MS: u64 = 1_000;

/// Run `operation` up to MAX_ATTEMPTS times, sleeping 1s, 2s between
/// attempts. Non-retryable errors return immediately.
pub async fn with_retry<T, F, Fut>(label: &str, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    %err,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "{} failed, retrying",
                    label
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(%err, attempts = attempt + 1, "{} failed", label);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::Timeout)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Status(503)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Unauthorized) }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
