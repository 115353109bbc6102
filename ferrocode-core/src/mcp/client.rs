//! Stdio JSON-RPC client for Model Context Protocol servers.
//!
//! Each configured server is a child process speaking line-delimited
//! JSON-RPC 2.0 on stdin/stdout. A reader task routes responses to pending
//! requests by id; notifications from the server are ignored.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, warn};

use crate::config::McpServerConfig;

const PROTOCOL_VERSION: &str = "2024-11-05";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool advertised by an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A running MCP server process.
pub struct McpServer {
    name: String,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl McpServer {
    /// Spawn the server process and complete the initialize handshake.
    pub async fn spawn(name: &str, config: &McpServerConfig) -> Result<Arc<Self>> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(config.env.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning MCP server '{name}' ({})", config.command))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("MCP server '{name}' has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("MCP server '{name}' has no stdout"))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader_name = name.to_owned();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(message) = serde_json::from_str::<Value>(&line) else {
                    warn!(server = %reader_name, "discarding non-JSON line from MCP server");
                    continue;
                };
                let Some(id) = message.get("id").and_then(Value::as_u64) else {
                    debug!(server = %reader_name, "ignoring MCP notification");
                    continue;
                };
                if let Some(sender) = reader_pending.lock().remove(&id) {
                    let _ = sender.send(message);
                }
            }
            debug!(server = %reader_name, "MCP server stdout closed");
        });

        let server = Arc::new(Self {
            name: name.to_owned(),
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
        });

        server
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "ferrocode", "version": env!("CARGO_PKG_VERSION")}
                }),
            )
            .await
            .with_context(|| format!("initializing MCP server '{name}'"))?;
        server.notify("notifications/initialized", json!({})).await?;

        Ok(server)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send_line(&self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.send_line(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(id, sender);

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if let Err(err) = self.send_line(&message).await {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => bail!("MCP server '{}' closed while awaiting {method}", self.name),
            Err(_) => {
                self.pending.lock().remove(&id);
                bail!("MCP server '{}' timed out on {method}", self.name);
            }
        };

        if let Some(error) = response.get("error") {
            bail!(
                "MCP server '{}' returned error for {method}: {error}",
                self.name
            );
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Discover the tools this server offers.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(tools
            .iter()
            .filter_map(|tool| {
                let name = tool.get("name")?.as_str()?.to_owned();
                Some(McpToolInfo {
                    name,
                    description: tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_owned(),
                    input_schema: tool
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
                })
            })
            .collect())
    }

    /// Invoke a tool and return its text content.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            bail!(
                "MCP tool '{name}' failed: {}",
                if text.is_empty() { "(no detail)" } else { &text }
            );
        }
        Ok(text)
    }

    /// Terminate the server process.
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Err(err) = child.kill().await {
            warn!(server = %self.name, "failed to kill MCP server: {err}");
        }
    }
}
