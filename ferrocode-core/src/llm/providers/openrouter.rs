//! OpenRouter provider (OpenAI-compatible chat completions).

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::llm::provider::{
    LLMError, LLMProvider, LLMRequest, LLMResponse, ToolCall, Usage,
};

const PROVIDER_NAME: &str = "openrouter";
const REFERER: &str = "https://github.com/ferrocode";

pub struct OpenRouterProvider {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn build_payload(request: &LLMRequest) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_owned(), json!(request.model));
        payload.insert("messages".to_owned(), json!(request.messages));
        if !request.tools.is_empty() {
            payload.insert("tools".to_owned(), json!(request.tools));
        }
        if let Some(max_tokens) = request.max_tokens {
            payload.insert("max_tokens".to_owned(), json!(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            payload.insert("temperature".to_owned(), json!(temperature));
        }
        Value::Object(payload)
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        if request.model.is_empty() {
            return Err(LLMError::InvalidRequest("model must not be empty".into()));
        }
        if self.api_key.is_empty() {
            return Err(LLMError::InvalidRequest(
                "missing API key (set OPENROUTER_API_KEY or [api] key)".into(),
            ));
        }

        let payload = Self::build_payload(&request);
        debug!(model = %request.model, messages = request.messages.len(), "sending completion request");

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", "ferrocode")
            .json(&payload)
            .send()
            .await
            .map_err(|err| LLMError::Network(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(LLMError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Network(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| LLMError::Protocol(format!("response is not JSON: {err}")))?;
        parse_completion(&body)
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

/// Parse an OpenAI-style completion body into the universal response shape.
pub(crate) fn parse_completion(body: &Value) -> Result<LLMResponse, LLMError> {
    // Some aggregators report errors with a 200 status.
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        let status = body
            .pointer("/error/code")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u16;
        return Err(LLMError::Api {
            status,
            message: message.to_owned(),
        });
    }

    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| LLMError::Protocol("response has no choices".into()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .filter(|text| !text.is_empty());

    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for raw in raw_calls {
            let name = raw
                .pointer("/function/name")
                .and_then(Value::as_str)
                .ok_or_else(|| LLMError::Protocol("tool call without function name".into()))?;
            let arguments = raw
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            let id = raw
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            tool_calls.push(ToolCall::function(id, name, arguments));
        }
    }

    let usage = body.get("usage").map(|raw| Usage {
        prompt_tokens: raw.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as usize,
        completion_tokens: raw
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        total_tokens: raw.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as usize,
    });

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Ok(LLMResponse {
        content,
        tool_calls,
        usage,
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_only_completion() {
        let body = json!({
            "model": "xiaomi/mimo-v2-flash:free",
            "choices": [{"message": {"role": "assistant", "content": "4"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        });
        let response = parse_completion(&body).unwrap();
        assert_eq!(response.content.as_deref(), Some("4"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 11);
    }

    #[test]
    fn parses_tool_calls_with_text() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": "Listing files first.",
                "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "ls", "arguments": "{\"path\": \".\"}"}}
                ]
            }}]
        });
        let response = parse_completion(&body).unwrap();
        assert_eq!(response.content.as_deref(), Some("Listing files first."));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].function.name, "ls");
    }

    #[test]
    fn fabricates_id_when_provider_omits_it() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [
                    {"type": "function", "function": {"name": "think", "arguments": "{}"}}
                ]
            }}]
        });
        let response = parse_completion(&body).unwrap();
        assert!(response.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn missing_choices_is_a_protocol_error() {
        let err = parse_completion(&json!({"object": "chat.completion"})).unwrap_err();
        assert!(matches!(err, LLMError::Protocol(_)));
    }

    #[test]
    fn embedded_error_object_is_an_api_error() {
        let body = json!({"error": {"code": 402, "message": "insufficient credits"}});
        let err = parse_completion(&body).unwrap_err();
        match err {
            LLMError::Api { status, message } => {
                assert_eq!(status, 402);
                assert!(message.contains("credits"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
