//! Provider abstraction for chat-completion endpoints.
//!
//! The request/response shapes follow the OpenAI tool-calling conventions
//! (which OpenRouter and most aggregators speak natively): an assistant
//! message may carry text, tool calls, or both, and tool results are sent
//! back as `tool` role messages referencing the originating call id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role within a model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// The function half of a tool call: a name plus JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as emitted by the model; decoded at execution time so a
    /// malformed payload becomes a tool-level error instead of a parse crash.
    pub arguments: String,
}

/// A model request to execute a named tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_owned(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Decode the argument payload, tolerating an empty string as `{}`.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.function.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.function.arguments)
    }
}

/// One message in the transcript sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Message {
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            ..Self::default()
        }
    }

    pub fn tool_response(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Rough token estimate used by the transcript truncation policy.
    pub fn estimate_tokens(&self) -> usize {
        let mut count = 4 + estimate_token_count(&self.content);
        if let Some(calls) = &self.tool_calls {
            for call in calls {
                count += 20
                    + estimate_token_count(&call.function.name)
                    + estimate_token_count(&call.function.arguments);
            }
        }
        if let Some(id) = &self.tool_call_id {
            count += estimate_token_count(id);
        }
        count
    }
}

/// Approximate tokens as characters divided by four.
pub fn estimate_token_count(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Function schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema object describing the argument shape.
    pub parameters: Value,
}

/// Tool definition in the wire format shared by OpenAI-style providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Universal completion request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LLMRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Token usage reported by a provider; advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Completion response: text and/or tool calls, never a subtype hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Provider error taxonomy. Transient transport conditions are retryable;
/// protocol and API contract violations are terminal.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Protocol(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LLMError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LLMError::Network(_) | LLMError::RateLimited { .. })
    }
}

/// Universal LLM provider trait.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Generate a completion for the request.
    async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_arguments_tolerate_empty_payload() {
        let call = ToolCall::function("call_1", "ls", "");
        assert_eq!(call.parsed_arguments().unwrap(), json!({}));
    }

    #[test]
    fn tool_call_arguments_surface_malformed_json() {
        let call = ToolCall::function("call_1", "ls", "{not json");
        assert!(call.parsed_arguments().is_err());
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let msg = Message::tool_response("call_9", "done");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_9");
    }

    #[test]
    fn retryable_classification() {
        assert!(LLMError::Network("reset".into()).is_retryable());
        assert!(
            LLMError::RateLimited {
                retry_after_secs: Some(2)
            }
            .is_retryable()
        );
        assert!(
            !LLMError::Api {
                status: 401,
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!LLMError::Protocol("no choices".into()).is_retryable());
    }
}
