//! Error types shared across the background, content, and popup contexts.
//!
//! None of these cross the message bus directly. The background router turns
//! them into `ActionResponse::failure` replies before anything is sent back.

use thiserror::Error;

/// Failures from the generation API gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API key not found. Please set your Cohere API key in the extension settings.")]
    MissingApiKey,

    /// Non-success status on the summary and connection-test paths, carrying
    /// the upstream `message` field or the status text.
    #[error("API request failed: {0}")]
    Connection(String),

    /// Non-success status on the phrase path, which never reads the body.
    #[error("API request failed with status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    Decode(String),

    #[error("API response contained no generations")]
    EmptyResponse,

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Failures of the page-side word replacement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("No text selected or no replacement available")]
    NothingToReplace,

    #[error("Selection changed before the replacement arrived")]
    SelectionChanged,
}

/// Failures delivering a message to another context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_message() {
        let err = GatewayError::MissingApiKey;
        assert!(err.to_string().starts_with("API key not found"));
    }

    #[test]
    fn test_connection_error_carries_upstream_message() {
        let err = GatewayError::Connection("invalid api token".to_string());
        assert_eq!(err.to_string(), "API request failed: invalid api token");
    }

    #[test]
    fn test_status_error() {
        let err = GatewayError::Status(429);
        assert_eq!(err.to_string(), "API request failed with status 429");
    }

    #[test]
    fn test_content_error_text() {
        assert_eq!(
            ContentError::NothingToReplace.to_string(),
            "No text selected or no replacement available"
        );
    }
}
