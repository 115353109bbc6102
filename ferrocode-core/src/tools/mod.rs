//! Tool system: trait, registry, permission gate, and execution pipeline.

pub mod builtin;
pub mod error;
pub mod executor;
pub mod permissions;
pub mod registry;
pub mod traits;

pub use error::{ToolError, ToolErrorType};
pub use executor::{ToolExecutor, ToolOutcome, ToolResultStatus};
pub use permissions::{
    PermissionGate, PermissionMode, PermissionPrompt, PermissionRule, PromptDecision, RuleAction,
};
pub use registry::{ToolProvenance, ToolRegistry};
pub use traits::{Tool, ToolCapability};
