//! ferrocode-core: the engine behind the ferrocode terminal coding agent.
//!
//! The crate is organized around five seams:
//! - [`llm`]: provider trait, wire types, and the retrying client
//! - [`tools`]: the tool trait, registry, permission gate, and executor
//! - [`mcp`]: Model Context Protocol servers merged into the tool registry
//! - [`agent`]: conversation state and the turn loop
//! - [`session`]: durable transcript storage

pub mod agent;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod session;
pub mod tools;

pub use agent::{AgentRunner, ConversationState, LoopPhase, Turn, TurnOutcome, TurnRole};
pub use config::FerrocodeConfig;
pub use llm::{LLMClient, LLMError, LLMProvider, LLMRequest, LLMResponse, OpenRouterProvider};
pub use session::{JsonlSessionStore, SessionStore, SessionSummary};
pub use tools::{
    PermissionGate, PermissionMode, ToolExecutor, ToolOutcome, ToolRegistry, ToolResultStatus,
};
