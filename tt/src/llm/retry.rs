//! Retry decorator for completion clients

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ByteStream, CompletionClient, CompletionError};

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Wraps a client and retries transient failures with exponential backoff
///
/// Only retryable errors (rate limits, 408, 5xx, network, timeout) are
/// retried. A rate limit's `retry-after` replaces the computed delay. For
/// streams only establishing the stream is retried; a stream that fails
/// part-way is the caller's to handle.
pub struct RetryPolicy {
    inner: Arc<dyn CompletionClient>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(inner: Arc<dyn CompletionClient>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn backoff(&self, attempt: u32, err: &CompletionError) -> Duration {
        err.retry_after()
            .unwrap_or_else(|| self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    async fn attempt<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, CompletionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CompletionError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt, &e);
                    warn!(op, attempt, delay_ms = delay.as_millis() as u64, error = %e, "RetryPolicy: retrying after transient error");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(op, attempt, error = %e, "RetryPolicy: giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl CompletionClient for RetryPolicy {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.attempt("complete", || self.inner.complete(prompt)).await
    }

    async fn stream_complete(&self, prompt: &str) -> Result<ByteStream, CompletionError> {
        self.attempt("stream_complete", || self.inner.stream_complete(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockCompletionClient;

    fn policy(mock: &Arc<MockCompletionClient>, max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(mock.clone(), max_retries).with_initial_backoff(Duration::from_millis(1))
    }

    fn server_error() -> CompletionError {
        CompletionError::ApiError {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let mock = Arc::new(MockCompletionClient::new(vec![
            Err(server_error()),
            Err(CompletionError::RateLimited {
                retry_after: Duration::from_millis(1),
            }),
            Ok("done".to_string()),
        ]));

        let result = policy(&mock, 3).complete("p").await.unwrap();
        assert_eq!(result, "done");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mock = Arc::new(MockCompletionClient::new(vec![
            Err(server_error()),
            Err(server_error()),
            Ok("too late".to_string()),
        ]));

        let err = policy(&mock, 1).complete("p").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let mock = Arc::new(MockCompletionClient::failing(400, "Bad Request"));

        let err = policy(&mock, 5).complete("p").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_honors_retry_after() {
        let mock = Arc::new(MockCompletionClient::new(vec![]));
        let policy = RetryPolicy::new(mock, 3).with_initial_backoff(Duration::from_millis(100));

        assert_eq!(policy.backoff(1, &server_error()), Duration::from_millis(100));
        assert_eq!(policy.backoff(3, &server_error()), Duration::from_millis(400));
        let limited = CompletionError::RateLimited {
            retry_after: Duration::from_secs(7),
        };
        assert_eq!(policy.backoff(1, &limited), Duration::from_secs(7));
    }
}
