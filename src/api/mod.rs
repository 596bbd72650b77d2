//! Wire payloads shared by the transports, the history store and the CLI.

use serde::{Deserialize, Serialize};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// OpenAI-compatible streaming request.
#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Request understood by the bundled backend server's `/chat/` endpoint.
#[derive(Serialize)]
pub struct BackendChatRequest<'a> {
    pub messages: Vec<ChatMessage>,
    pub llm: &'a LlmProvider,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One streamed delta object, `{choices:[{delta:{content}}]}`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    /// Delta carrying a single content piece.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatResponseChoice {
                delta: ChatResponseDelta {
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

/// Read-only provider configuration used to pick a transport.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LlmProvider {
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default, alias = "system_message")]
    pub system_message: String,
    #[serde(default, alias = "api_key_name")]
    pub api_key_name: String,
    #[serde(default, alias = "api_base", skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,
}

impl LlmProvider {
    pub fn is_local(&self) -> bool {
        self.local.unwrap_or(false)
    }
}

/// One turn of a conversation, tagged with the provider that produced it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub role: String,
    pub content: String,
    #[serde(rename = "llmInfo")]
    pub llm_info: LlmProvider,
}

impl Token {
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.clone(), self.content.clone())
    }
}

pub fn messages_from_tokens(tokens: &[Token]) -> Vec<ChatMessage> {
    tokens.iter().map(Token::to_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_uses_camel_case_on_the_wire() {
        let json = r#"{
            "model": "gpt-4o-mini",
            "provider": "openai",
            "title": "GPT-4o-mini",
            "icon": "simple-icons:openai",
            "subtitle": "Faster for everyday tasks",
            "systemMessage": "Be brief.",
            "apiKeyName": "OPENAI_API",
            "local": false
        }"#;
        let provider: LlmProvider = serde_json::from_str(json).expect("valid provider");
        assert_eq!(provider.system_message, "Be brief.");
        assert_eq!(provider.api_key_name, "OPENAI_API");
        assert_eq!(provider.api_base, None);
        assert!(!provider.is_local());

        let value = serde_json::to_value(&provider).expect("serializes");
        assert!(value.get("systemMessage").is_some());
        assert!(value.get("apiBase").is_none());
    }

    #[test]
    fn delta_content_is_taken_from_first_choice() {
        let payload = r#"{"choices":[{"delta":{"content":"Hi"}},{"delta":{"content":"ignored"}}]}"#;
        let response: ChatResponse = serde_json::from_str(payload).expect("valid delta");
        assert_eq!(response.content(), Some("Hi"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert_eq!(empty.content(), None);
    }
}
