//! Completion client.
//!
//! One trait so the gateway can be exercised without a network, one real
//! implementation speaking the OpenRouter chat-completions API.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::error::AssistantError;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Turns a message history into one reply.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError>;
}

pub struct OpenRouterClient {
    config: AssistantConfig,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ChatClient for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            return Err(AssistantError::MissingApiKey);
        };

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("HTTP-Referer", &self.config.site_url)
            .header("X-Title", &self.config.site_name)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "completion provider rejected the request");
            return Err(AssistantError::Provider { status, body });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AssistantError::EmptyCompletion);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::user("hi");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(
            serde_json::to_value(ChatMessage::system("x")).unwrap()["role"],
            "system"
        );
        assert_eq!(
            serde_json::to_value(ChatMessage::assistant("x")).unwrap()["role"],
            "assistant"
        );
    }

    #[test]
    fn completion_response_tolerates_missing_fields() {
        let parsed: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.choices.is_empty());

        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_without_a_network_call() {
        let client = OpenRouterClient::new(AssistantConfig {
            api_key: None,
            model: "anthropic/claude-3-opus:beta".to_string(),
            site_url: "http://localhost:8080".to_string(),
            site_name: "maildeck".to_string(),
        });
        let result = client.complete(&[ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(AssistantError::MissingApiKey)));
    }
}
