//! Model access: provider trait, wire types, and the retrying client.

pub mod client;
pub mod provider;
pub mod providers;

pub use client::LLMClient;
pub use provider::{
    FunctionCall, FunctionDefinition, LLMError, LLMProvider, LLMRequest, LLMResponse, Message,
    MessageRole, ToolCall, ToolDefinition, Usage, estimate_token_count,
};
pub use providers::OpenRouterProvider;
