//! The tool trait every builtin and MCP-backed tool implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::provider::ToolDefinition;

/// Whether a tool can change state outside the conversation. Read-only tools
/// bypass the permission prompt in `ask` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCapability {
    #[default]
    ReadOnly,
    Mutating,
}

/// A callable tool. Implementations return `Err` for operational failures;
/// the executor converts those into error payloads for the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the argument object.
    fn parameters(&self) -> Value;

    fn capability(&self) -> ToolCapability {
        ToolCapability::ReadOnly
    }

    /// For permission checks: the path or command this call touches, if any.
    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("path")
            .or_else(|| args.get("command"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Build the wire-format definition advertised to the model.
pub fn definition_for(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition::function(tool.name(), tool.description(), tool.parameters())
}
