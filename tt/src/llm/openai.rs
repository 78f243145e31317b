//! OpenAI API client implementation
//!
//! Implements CompletionClient for OpenAI's Chat Completions API. Streaming
//! responses are re-encoded as `{"text": ...}` events so every provider
//! hands the relay the same framing.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ByteStream, CompletionClient, CompletionError};
use crate::config::LlmConfig;
use crate::sse::encode_text_event;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(CompletionError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Build the request body for a single user prompt
    fn build_request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        debug!(%self.model, stream, "build_request_body: called");

        // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(self.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(self.max_tokens);
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
    }
}

/// Status text for an error response: the body when present, else the reason phrase
async fn error_message(response: reqwest::Response) -> String {
    let reason = response.status().canonical_reason().unwrap_or("Unknown").to_string();
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => reason,
    }
}

fn rate_limited(headers: &reqwest::header::HeaderMap) -> CompletionError {
    let retry_after = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60);

    CompletionError::RateLimited {
        retry_after: Duration::from_secs(retry_after),
    }
}

/// Map one upstream stream message to a relay frame, if it carries text
fn delta_frame(data: &str) -> Option<bytes::Bytes> {
    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(|content| encode_text_event(&content)),
        Err(e) => {
            warn!(error = %e, "delta_frame: skipping malformed upstream chunk");
            None
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(%self.model, prompt_len = prompt.len(), "complete: called");
        let body = self.build_request_body(prompt, false);

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| CompletionError::from_transport(e, self.timeout))?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("complete: rate limited (429)");
            return Err(rate_limited(response.headers()));
        }

        if !response.status().is_success() {
            debug!(%status, "complete: API error");
            let message = error_message(response).await;
            return Err(CompletionError::ApiError { status, message });
        }

        debug!("complete: success");
        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::from_transport(e, self.timeout))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("Response has no message content".to_string()))
    }

    async fn stream_complete(&self, prompt: &str) -> Result<ByteStream, CompletionError> {
        debug!(%self.model, prompt_len = prompt.len(), "stream_complete: called");
        let body = self.build_request_body(prompt, true);

        let mut es = EventSource::new(self.request(&body)).map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        // Wait for the connection so a bad status surfaces before any bytes do
        match es.next().await {
            Some(Ok(Event::Open)) => debug!("stream_complete: Event::Open"),
            Some(Ok(Event::Message(msg))) => {
                // Open is always first; anything else means a misbehaving transport
                es.close();
                return Err(CompletionError::InvalidResponse(format!(
                    "Unexpected message before open: {}",
                    msg.data
                )));
            }
            Some(Err(e)) => {
                es.close();
                return Err(map_eventsource_error(e, self.timeout).await);
            }
            None => {
                return Err(CompletionError::InvalidResponse("Stream closed before opening".to_string()));
            }
        }

        let timeout = self.timeout;
        let stream = futures::stream::unfold(Some(es), move |state| async move {
            let mut es = state?;
            loop {
                match es.next().await {
                    Some(Ok(Event::Message(msg))) => {
                        if msg.data.trim() == "[DONE]" {
                            debug!("stream_complete: [DONE]");
                            es.close();
                            return None;
                        }
                        if let Some(frame) = delta_frame(&msg.data) {
                            return Some((Ok(frame), Some(es)));
                        }
                    }
                    Some(Ok(Event::Open)) => debug!("stream_complete: Event::Open"),
                    Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                        debug!("stream_complete: upstream ended");
                        es.close();
                        return None;
                    }
                    Some(Err(e)) => {
                        es.close();
                        let err = map_eventsource_error(e, timeout).await;
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

async fn map_eventsource_error(err: reqwest_eventsource::Error, timeout: Duration) -> CompletionError {
    use reqwest_eventsource::Error;

    match err {
        Error::InvalidStatusCode(status, response) => {
            if status.as_u16() == 429 {
                return rate_limited(response.headers());
            }
            let message = error_message(response).await;
            CompletionError::ApiError {
                status: status.as_u16(),
                message,
            }
        }
        Error::Transport(e) => CompletionError::from_transport(e, timeout),
        other => CompletionError::InvalidResponse(other.to_string()),
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

// Streaming types

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(model: &str) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens: 512,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_build_request_body() {
        let body = client("gpt-4o-mini").build_request_body("Task: Write docs", false);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Task: Write docs");
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_build_request_body_streaming_and_completion_tokens() {
        let body = client("o3-mini").build_request_body("hi", true);

        assert_eq!(body["stream"], true);
        assert_eq!(body["max_completion_tokens"], 512);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_url() {
        assert_eq!(client("gpt-4o").url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_delta_frame() {
        let frame = delta_frame(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#).unwrap();
        assert_eq!(&frame[..], &b"event: message\ndata: {\"text\":\"Hel\"}\n\n"[..]);

        // role-only and empty deltas carry no text
        assert!(delta_frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
        assert!(delta_frame(r#"{"choices":[]}"#).is_none());
        assert!(delta_frame("not json").is_none());
    }

    #[test]
    fn test_parse_response_types() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"1. Step"},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":2}}"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("1. Step"));
    }
}
