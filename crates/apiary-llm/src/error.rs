//! LLM boundary errors.

use std::time::Duration;
use thiserror::Error;

/// Errors from the provider boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider returned an error response.
    #[error("provider error: {message}")]
    Provider {
        /// Provider-reported message.
        message: String,
    },

    /// The request exceeded its timeout.
    #[error("LLM request timed out after {limit:?}")]
    Timeout {
        /// The configured limit.
        limit: Duration,
    },

    /// The response could not be interpreted. When a custom `base_url` is in
    /// play this usually means a proxy returned a non-JSON body; the URL is
    /// included so the operator can tell which hop misbehaved.
    #[error("malformed provider response: {message}{}", base_url.as_ref().map(|u| format!(" (base_url: {u})")).unwrap_or_default())]
    MalformedResponse {
        /// What was wrong.
        message: String,
        /// The configured base URL, if any.
        base_url: Option<String>,
    },
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_response_names_base_url() {
        let err = LlmError::MalformedResponse {
            message: "expected JSON, got text/html".to_string(),
            base_url: Some("https://proxy.internal".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("expected JSON"));
        assert!(rendered.contains("https://proxy.internal"));
    }

    #[test]
    fn test_malformed_response_without_base_url() {
        let err = LlmError::MalformedResponse {
            message: "missing choices".to_string(),
            base_url: None,
        };
        assert!(!err.to_string().contains("base_url:"));
    }
}
