//! Single retry on transient conflicts
//!
//! The backend answers 409 with `{"retryable": true}` while a write it
//! depends on is still settling. Such a call is repeated once after a
//! fixed backoff; every other outcome passes through untouched.

use grant_api_client::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default wait before the retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `call`, invoking it at most once more on a transient conflict
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match call().await {
            Err(err) if err.is_transient_conflict() => {
                warn!(
                    backoff_ms = self.backoff.as_millis() as u64,
                    error = %err,
                    "Transient conflict, retrying once"
                );
                tokio::time::sleep(self.backoff).await;
                call().await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn conflict(retryable: bool) -> ApiError {
        ApiError::Conflict {
            retryable,
            message: "busy".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_after_backoff() {
        let calls = &AtomicU32::new(0);
        let started = Instant::now();

        let result = RetryPolicy::default()
            .execute(move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(conflict(true)),
                    _ => Ok("saved"),
                }
            })
            .await;

        assert_eq!(result.unwrap(), "saved");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= DEFAULT_RETRY_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_conflict_propagates() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict(true))
            })
            .await;

        assert!(result.unwrap_err().is_transient_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::new(Duration::from_millis(1))
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict(false))
            })
            .await;

        assert!(matches!(result, Err(ApiError::Conflict { retryable: false, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_calls_once() {
        let calls = &AtomicU32::new(0);
        let value = RetryPolicy::default()
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
