// HTTP chat provider (OpenAI-compatible chat completions endpoint)

use crate::provider::retry::with_retry;
use crate::provider::{ChatMessage, ChatProvider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct HttpChatProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpChatProvider {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            max_tokens,
        })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Unauthorized,
                429 => ProviderError::RateLimited,
                code => ProviderError::Status(code),
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("response has no choices".into()))?;

        Ok(content)
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        tracing::debug!(messages = messages.len(), model = %self.model, "requesting completion");
        let reply = with_retry("chat completion", || self.send(messages)).await?;
        tracing::debug!(chars = reply.len(), "completion received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(url: &str) -> HttpChatProvider {
        HttpChatProvider::new(
            format!("{}/v1/chat/completions", url),
            "test-key",
            "test-model",
            0.2,
            2000,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello!"}}]}"#)
            .create_async()
            .await;

        let reply = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "hello!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_body_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_fail() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status(503)));
        mock.assert_async().await;
    }
}
