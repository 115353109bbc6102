//! Model Context Protocol integration over stdio JSON-RPC.

pub mod client;
pub mod tool;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::McpConfig;
use crate::tools::registry::{ToolProvenance, ToolRegistry};

pub use client::{McpServer, McpToolInfo};
pub use tool::McpTool;

/// Handle to every successfully started MCP server, kept alive for the
/// duration of the session.
#[derive(Default)]
pub struct McpConnections {
    servers: Vec<Arc<McpServer>>,
}

impl McpConnections {
    /// Spawn each configured server and merge its tools into the registry.
    /// An unreachable server degrades to a warning; the agent runs on.
    pub async fn connect_all(config: &McpConfig, registry: &ToolRegistry) -> Self {
        let mut servers = Vec::new();
        for (name, server_config) in &config.servers {
            let server = match McpServer::spawn(name, server_config).await {
                Ok(server) => server,
                Err(err) => {
                    warn!(server = %name, "skipping MCP server: {err:#}");
                    continue;
                }
            };
            let tools = match server.list_tools().await {
                Ok(tools) => tools,
                Err(err) => {
                    warn!(server = %name, "failed to list MCP tools: {err:#}");
                    server.shutdown().await;
                    continue;
                }
            };
            let count = tools.len();
            for info in tools {
                let tool = Arc::new(McpTool::new(server.clone(), info));
                if let Err(err) = registry.register(
                    tool,
                    ToolProvenance::Mcp {
                        server: name.clone(),
                    },
                ) {
                    warn!(server = %name, "failed to register MCP tool: {err:#}");
                }
            }
            info!(server = %name, tools = count, "MCP server connected");
            servers.push(server);
        }
        Self { servers }
    }

    pub async fn shutdown(&self) {
        for server in &self.servers {
            server.shutdown().await;
        }
    }
}
