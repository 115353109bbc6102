//! The agent: conversation state plus the turn loop that drives it.

pub mod conversation;
pub mod runner;

pub use conversation::{ConversationState, Turn, TurnRole, UsageTotals};
pub use runner::{AgentRunner, LoopPhase, TurnOutcome};
