//! Adapter exposing an MCP server tool through the local `Tool` trait.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::mcp::client::{McpServer, McpToolInfo};
use crate::tools::traits::{Tool, ToolCapability};

/// An MCP-discovered tool, registered under `mcp_<server>_<tool>` so remote
/// tools never collide with builtins or with other servers.
pub struct McpTool {
    server: Arc<McpServer>,
    info: McpToolInfo,
    full_name: String,
}

impl McpTool {
    pub fn new(server: Arc<McpServer>, info: McpToolInfo) -> Self {
        let full_name = format!("mcp_{}_{}", server.name(), info.name);
        Self {
            server,
            info,
            full_name,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters(&self) -> Value {
        self.info.input_schema.clone()
    }

    fn capability(&self) -> ToolCapability {
        // Remote tools can do anything; treat them all as mutating.
        ToolCapability::Mutating
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let text = self.server.call_tool(&self.info.name, args).await?;
        Ok(Value::String(text))
    }
}
