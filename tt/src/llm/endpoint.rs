//! Client for a completion endpoint speaking `{prompt}` in, SSE `{text}` out

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{ByteStream, CompletionClient, CompletionError};
use crate::config::LlmConfig;
use crate::relay::relay_to_end;

/// Completion endpoint client
///
/// The endpoint already emits `{"text": ...}` events, so the response body is
/// handed out as-is.
pub struct EndpointClient {
    url: String,
    http: Client,
    timeout: Duration,
}

impl EndpointClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CompletionError> {
        let http = Client::builder().timeout(timeout).build().map_err(CompletionError::Network)?;
        Ok(Self {
            url: url.into(),
            http,
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        debug!(url = %config.base_url, "from_config: called");
        Self::new(config.base_url.clone(), Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl CompletionClient for EndpointClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(prompt_len = prompt.len(), "complete: called");
        let stream = self.stream_complete(prompt).await?;
        relay_to_end(stream).await
    }

    async fn stream_complete(&self, prompt: &str) -> Result<ByteStream, CompletionError> {
        debug!(url = %self.url, prompt_len = prompt.len(), "stream_complete: called");
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| CompletionError::from_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "stream_complete: API error");
            return Err(CompletionError::ApiError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let timeout = self.timeout;
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| CompletionError::from_transport(e, timeout)));
        Ok(Box::pin(stream))
    }
}
