//! Chat-completion contract: ordered dialogue in, one assistant text out.

use std::time::Duration;

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub role: Role,
    pub content: String,
}

impl Dialogue {
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

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat request rejected: status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Chat response carried no choices")]
    EmptyResponse,
}

impl LlmError {
    /// 4xx means the request itself was refused; everything else is the
    /// service being unreachable or broken.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LlmError::Status { status, .. } if (400..500).contains(status))
    }
}

/// One completion per finalized user utterance. Implementations must not
/// retry internally: a retry at this level would reorder turns.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, dialogues: &[Dialogue]) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Dialogue],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// OpenAI-compatible chat completion endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, dialogues: &[Dialogue]) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: dialogues,
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        tracing::debug!(chars = choice.message.content.len(), "chat completion received");
        Ok(choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_serializes_with_lowercase_roles() {
        let json = serde_json::to_value(Dialogue::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Dialogue {
            role: Role::System,
            content: "be brief".into(),
        })
        .unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn chat_request_wire_shape() {
        let messages = vec![Dialogue::user("ping"), Dialogue::assistant("pong")];
        let request = ChatRequest {
            model: "deepseek-chat",
            messages: &messages,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "pong");
    }

    #[test]
    fn rejection_classification() {
        assert!(LlmError::Status {
            status: 422,
            body: String::new()
        }
        .is_rejection());
        assert!(!LlmError::Status {
            status: 502,
            body: String::new()
        }
        .is_rejection());
        assert!(!LlmError::EmptyResponse.is_rejection());
    }
}
