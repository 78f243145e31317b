//! Completion clients for tasktree
//!
//! One trait, two providers, and an optional retry layer on top.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod endpoint;
mod error;
mod openai;
mod retry;

pub use client::{ByteStream, CompletionClient};
pub use endpoint::EndpointClient;
pub use error::CompletionError;
pub use openai::OpenAIClient;
pub use retry::RetryPolicy;

use crate::config::LlmConfig;

/// Create a completion client based on the provider specified in config
///
/// Supports "openai" and "endpoint". When `max-retries` is non-zero the
/// client is wrapped in a [`RetryPolicy`].
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    let client: Arc<dyn CompletionClient> = match config.provider.as_str() {
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Arc::new(OpenAIClient::from_config(config)?)
        }
        "endpoint" => {
            debug!("create_client: creating endpoint client");
            Arc::new(EndpointClient::from_config(config)?)
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            return Err(CompletionError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: openai, endpoint",
                other
            )));
        }
    };

    if config.max_retries > 0 {
        debug!(max_retries = config.max_retries, "create_client: adding retry layer");
        return Ok(Arc::new(RetryPolicy::new(client, config.max_retries)));
    }
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_endpoint_provider_needs_no_key() {
        let config = LlmConfig {
            provider: "endpoint".to_string(),
            base_url: "http://localhost:3000/api/completion".to_string(),
            max_retries: 2,
            ..LlmConfig::default()
        };
        assert!(create_client(&config).is_ok());
    }
}
