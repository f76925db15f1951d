// Chat provider abstraction
//
// The conversation loop only sees the ChatProvider trait; the HTTP
// implementation lives in client.rs. Tests substitute scripted providers.

pub mod client;
pub mod retry;

pub use client::HttpChatProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Provider-side failures. The loop collapses all of these into a single
/// "reply unavailable" feedback message; variants exist so the retry
/// policy can distinguish transient from permanent.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("authentication failed (check api_key)")]
    Unauthorized,

    #[error("rate limited")]
    RateLimited,

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout
            | ProviderError::RateLimited
            | ProviderError::Network(_) => true,
            ProviderError::Status(code) => *code >= 500,
            ProviderError::Unauthorized | ProviderError::Malformed(_) => false,
        }
    }

    /// Uniform message shown to the user and the model.
    pub fn user_message(&self) -> String {
        format!("reply unavailable: {}", self)
    }
}

/// Anything that can turn a message list into an assistant reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Status(503).is_retryable());
        assert!(!ProviderError::Status(400).is_retryable());
        assert!(!ProviderError::Unauthorized.is_retryable());
        assert!(!ProviderError::Malformed("no choices".into()).is_retryable());
    }

    #[test]
    fn test_user_message_is_uniform() {
        assert!(ProviderError::Timeout.user_message().starts_with("reply unavailable"));
        assert!(ProviderError::Status(502).user_message().starts_with("reply unavailable"));
    }
}
