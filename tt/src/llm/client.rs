//! CompletionClient trait definition

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use super::CompletionError;

/// Server-sent-event framed bytes, each event carrying `{"text": ...}` JSON
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>;

/// Stateless completion client - each call is an independent prompt
///
/// Implementations never retry; wrap a client in [`super::RetryPolicy`] when
/// retries are wanted.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a prompt and wait for the full response text
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Send a prompt and get back a pull handle over the streamed response
    ///
    /// A non-success upstream status is reported here, before any bytes are
    /// handed out. Dropping the stream releases the underlying connection.
    async fn stream_complete(&self, prompt: &str) -> Result<ByteStream, CompletionError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Scripted completion client for unit tests
    pub struct MockCompletionClient {
        replies: Mutex<VecDeque<Result<String, CompletionError>>>,
        chunks: Mutex<Option<Vec<Bytes>>>,
        prompts: Mutex<Vec<String>>,
        call_count: AtomicUsize,
    }

    impl MockCompletionClient {
        pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
            debug!(reply_count = %replies.len(), "MockCompletionClient::new: called");
            Self {
                replies: Mutex::new(replies.into()),
                chunks: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Client whose every `complete` returns the same text
        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        /// Client whose first call fails with an upstream status
        pub fn failing(status: u16, message: &str) -> Self {
            Self::new(vec![Err(CompletionError::ApiError {
                status,
                message: message.to_string(),
            })])
        }

        /// Script the raw chunks handed out by `stream_complete`
        pub fn with_chunks(self, chunks: Vec<Vec<u8>>) -> Self {
            *self.chunks.lock().unwrap() = Some(chunks.into_iter().map(Bytes::from).collect());
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for MockCompletionClient {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            debug!("MockCompletionClient::complete: called");
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionError::InvalidResponse("No more mock responses".to_string())))
        }

        async fn stream_complete(&self, prompt: &str) -> Result<ByteStream, CompletionError> {
            debug!("MockCompletionClient::stream_complete: called");
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let chunks = self
                .chunks
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| CompletionError::InvalidResponse("No mock stream scripted".to_string()))?;
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use futures::StreamExt;

        #[tokio::test]
        async fn test_mock_client_returns_replies_in_order() {
            let client = MockCompletionClient::new(vec![Ok("one".to_string()), Ok("two".to_string())]);

            assert_eq!(client.complete("a").await.unwrap(), "one");
            assert_eq!(client.complete("b").await.unwrap(), "two");
            assert!(client.complete("c").await.is_err());
            assert_eq!(client.call_count(), 3);
            assert_eq!(client.prompts(), vec!["a", "b", "c"]);
        }

        #[tokio::test]
        async fn test_mock_client_streams_chunks() {
            let client = MockCompletionClient::new(vec![]).with_chunks(vec![b"data: 1\n".to_vec(), b"\n".to_vec()]);
            let stream = client.stream_complete("p").await.unwrap();
            let chunks: Vec<_> = stream.collect().await;
            assert_eq!(chunks.len(), 2);
        }
    }
}
