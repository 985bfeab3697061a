//! AI backend client
//!
//! The relay talks to a single OpenAI-compatible chat-completion endpoint
//! (the Shapes API) through the [`ChatBackend`] trait.

pub mod http_utils;
pub mod shapes;

pub use shapes::ShapesClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the backend
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the backend's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Rate limit exceeded (429), optionally with a wait time
    #[error("Rate limit exceeded: {message} (wait: {wait_secs:?}s)")]
    RateLimit {
        /// Retry-After duration in seconds, if provided by the server
        wait_secs: Option<u64>,
        /// Error message from the server
        message: String,
    },
}

/// A backend answer
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    /// `choices[0].message.content`, untouched; `null` when absent
    pub content: Value,
    /// Backend says the author of the prompt is a bot
    pub is_bot: bool,
}

impl BackendReply {
    /// Reply with string content
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            content: Value::String(content.to_string()),
            is_bot: false,
        }
    }

    /// True when there is no usable text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match &self.content {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Chat-completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one user message on behalf of `user_id` in `channel_id`
    async fn send(
        &self,
        user_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<BackendReply, LlmError>;
}
