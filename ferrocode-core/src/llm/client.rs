//! Client wrapper that adds retry and transcript truncation on top of a
//! provider.

use std::time::Duration;

use tracing::{debug, warn};

use crate::llm::provider::{
    LLMError, LLMProvider, LLMRequest, LLMResponse, Message, MessageRole, ToolDefinition,
};

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// High-level completion client. Owns the active model name and applies the
/// context-budget truncation policy before every provider call.
pub struct LLMClient {
    provider: Box<dyn LLMProvider>,
    model: String,
    max_tokens: u32,
    context_budget_tokens: usize,
    max_attempts: usize,
    base_delay: Duration,
}

impl LLMClient {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        model: impl Into<String>,
        max_tokens: u32,
        context_budget_tokens: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            context_budget_tokens,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Request a completion, retrying transient failures with bounded
    /// exponential backoff. Terminal errors surface immediately.
    pub async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, LLMError> {
        let messages = truncate_to_budget(messages, self.context_budget_tokens);
        let request = LLMRequest {
            messages,
            tools: tools.to_vec(),
            model: self.model.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: None,
        };

        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            match self.provider.generate(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = match &err {
                        LLMError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => self.base_delay * 2u32.pow(attempt as u32),
                    };
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "completion failed, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| LLMError::Network("retries exhausted".into())))
    }
}

/// Drop the oldest non-system messages until the estimated size fits the
/// budget. The first system message is always kept, and the kept suffix never
/// starts with a tool-result message, so an assistant message with tool calls
/// is never separated from its results.
fn truncate_to_budget(messages: &[Message], budget_tokens: usize) -> Vec<Message> {
    let total: usize = messages.iter().map(Message::estimate_tokens).sum();
    if total <= budget_tokens {
        return messages.to_vec();
    }

    let system = messages
        .first()
        .filter(|msg| msg.role == MessageRole::System);
    let system_tokens = system.map(Message::estimate_tokens).unwrap_or(0);
    let body = if system.is_some() {
        &messages[1..]
    } else {
        messages
    };

    // Find the earliest start index whose suffix fits under the budget.
    let mut start = 0;
    let mut suffix_tokens: usize = body.iter().map(Message::estimate_tokens).sum();
    while start < body.len() && system_tokens + suffix_tokens > budget_tokens {
        suffix_tokens -= body[start].estimate_tokens();
        start += 1;
    }
    // Never lead with an orphaned tool result.
    while start < body.len() && body[start].role == MessageRole::Tool {
        start += 1;
    }

    debug!(
        dropped = start,
        kept = body.len() - start,
        "transcript over context budget, dropping oldest messages"
    );

    let mut result = Vec::with_capacity(1 + body.len() - start);
    if let Some(system) = system {
        result.push(system.clone());
    }
    result.extend_from_slice(&body[start..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ToolCall;
    use pretty_assertions::assert_eq;

    fn long_user(text: &str) -> Message {
        Message::user(text.repeat(400))
    }

    #[test]
    fn small_transcripts_pass_through_untouched() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let kept = truncate_to_budget(&messages, 10_000);
        assert_eq!(kept, messages);
    }

    #[test]
    fn system_message_survives_truncation() {
        let messages = vec![
            Message::system("you are a coding agent"),
            long_user("old "),
            long_user("mid "),
            Message::user("newest question"),
        ];
        let kept = truncate_to_budget(&messages, 500);
        assert_eq!(kept[0].role, MessageRole::System);
        assert_eq!(kept.last().unwrap().content, "newest question");
        assert!(kept.len() < messages.len());
    }

    #[test]
    fn kept_suffix_never_starts_with_tool_result() {
        let call = ToolCall::function("call_1", "ls", "{}");
        let messages = vec![
            Message::system("sys"),
            long_user("padding "),
            Message::assistant_with_tools("", vec![call]),
            Message::tool_response("call_1", "a.rs\nb.rs"),
            Message::user("next"),
        ];
        // Budget small enough to force dropping into the middle of the
        // assistant/tool pair.
        let kept = truncate_to_budget(&messages, 50);
        let first_body = kept
            .iter()
            .find(|msg| msg.role != MessageRole::System)
            .unwrap();
        assert_ne!(first_body.role, MessageRole::Tool);
        assert_eq!(kept.last().unwrap().content, "next");
    }

    #[test]
    fn truncation_keeps_newest_messages() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..20 {
            messages.push(long_user(&format!("message {i} ")));
        }
        let kept = truncate_to_budget(&messages, 3_000);
        assert!(kept.len() < messages.len());
        assert_eq!(kept.last().unwrap().content, messages.last().unwrap().content);
    }
}
