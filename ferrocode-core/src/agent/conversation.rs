//! Conversation state: the append-only turn log behind the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::provider::{Message, ToolCall, Usage};
use crate::tools::executor::{ToolOutcome, ToolResultStatus};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ToolResult,
}

/// One entry in the conversation log. Turns are append-only; nothing edits
/// or removes a turn once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolResultStatus>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            status: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            status: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            status: None,
            created_at: Utc::now(),
        }
    }

    pub fn tool_result(outcome: &ToolOutcome) -> Self {
        Self {
            role: TurnRole::ToolResult,
            content: outcome.payload.clone(),
            tool_calls: Vec::new(),
            tool_call_id: Some(outcome.call_id.clone()),
            status: Some(outcome.status),
            created_at: Utc::now(),
        }
    }
}

/// Running totals of provider-reported token usage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl UsageTotals {
    pub fn add(&mut self, usage: &Usage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
    }
}

/// The full conversation for one session.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub session_id: String,
    pub model: String,
    pub turns: Vec<Turn>,
    pub usage: UsageTotals,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
            turns: Vec::new(),
            usage: UsageTotals::default(),
        }
    }

    pub fn with_turns(
        session_id: impl Into<String>,
        model: impl Into<String>,
        turns: Vec<Turn>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
            turns,
            usage: UsageTotals::default(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Project the turn log into the wire transcript, prefixed with the
    /// system prompt.
    pub fn to_messages(&self, system_prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(Message::system(system_prompt));
        for turn in &self.turns {
            messages.push(match turn.role {
                TurnRole::User => Message::user(&turn.content),
                TurnRole::Assistant => {
                    if turn.tool_calls.is_empty() {
                        Message::assistant(&turn.content)
                    } else {
                        Message::assistant_with_tools(&turn.content, turn.tool_calls.clone())
                    }
                }
                TurnRole::ToolResult => Message::tool_response(
                    turn.tool_call_id.clone().unwrap_or_default(),
                    &turn.content,
                ),
            });
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::MessageRole;
    use pretty_assertions::assert_eq;

    #[test]
    fn projection_prefixes_system_prompt() {
        let mut state = ConversationState::new("default", "test/model");
        state.push(Turn::user("hello"));
        state.push(Turn::assistant("hi there"));

        let messages = state.to_messages("you are helpful");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[2].content, "hi there");
    }

    #[test]
    fn tool_results_carry_call_ids() {
        let outcome = ToolOutcome {
            call_id: "call_7".to_owned(),
            tool_name: "ls".to_owned(),
            status: ToolResultStatus::Ok,
            payload: "a.rs".to_owned(),
        };
        let mut state = ConversationState::new("default", "test/model");
        state.push(Turn::assistant_with_calls(
            "",
            vec![ToolCall::function("call_7", "ls", "{}")],
        ));
        state.push(Turn::tool_result(&outcome));

        let messages = state.to_messages("sys");
        assert!(messages[1].has_tool_calls());
        assert_eq!(messages[2].role, MessageRole::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn usage_totals_accumulate() {
        let mut totals = UsageTotals::default();
        totals.add(&Usage {
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
        });
        totals.add(&Usage {
            prompt_tokens: 150,
            completion_tokens: 30,
            total_tokens: 180,
        });
        assert_eq!(totals.prompt_tokens, 250);
        assert_eq!(totals.completion_tokens, 50);
    }
}
