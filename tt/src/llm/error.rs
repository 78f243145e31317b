//! Completion error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the completion backend
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompletionError {
    /// Classify a transport error, separating timeouts from other failures
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout(timeout)
        } else {
            CompletionError::Network(err)
        }
    }

    /// Upstream HTTP status, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::RateLimited { .. } => Some(429),
            CompletionError::ApiError { status, .. } => Some(*status),
            CompletionError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, CompletionError::RateLimited { .. })
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::RateLimited { .. } => true,
            CompletionError::ApiError { status, .. } => *status == 408 || *status >= 500,
            CompletionError::Network(_) => true,
            CompletionError::Timeout(_) => true,
            CompletionError::InvalidResponse(_) => false,
            CompletionError::Json(_) => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CompletionError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_rate_limit() {
        let err = CompletionError::RateLimited {
            retry_after: Duration::from_secs(60),
        };
        assert!(err.is_rate_limit());
        assert_eq!(err.status(), Some(429));

        let err = CompletionError::ApiError {
            status: 500,
            message: "Server error".to_string(),
        };
        assert!(!err.is_rate_limit());
    }

    #[test]
    fn test_is_retryable() {
        assert!(
            CompletionError::ApiError {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_retryable()
        );

        // 4xx errors should not be retried
        assert!(
            !CompletionError::ApiError {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );

        assert!(CompletionError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!CompletionError::InvalidResponse("Bad JSON".to_string()).is_retryable());
    }

    #[test]
    fn test_api_error_carries_status_text() {
        let err = CompletionError::ApiError {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "API error 503: Service Unavailable");
    }

    #[test]
    fn test_retry_after() {
        let err = CompletionError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(CompletionError::Timeout(Duration::from_secs(1)).retry_after(), None);
    }
}
