//! Shell command execution.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;

use crate::tools::builtin::file_ops::required_str;
use crate::tools::traits::{Tool, ToolCapability};

/// Run a shell command with a timeout. Output combines stdout and stderr,
/// with a trailing exit-code note on failure.
pub struct BashTool {
    default_timeout: Duration,
}

impl BashTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output. Supports an optional timeout in seconds."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command to run via sh -c"},
                "timeout": {"type": "integer", "description": "Timeout in seconds"}
            },
            "required": ["command"]
        })
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let command = required_str(&args, "command")?;
        let timeout = args
            .get("timeout")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning '{command}'"))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.with_context(|| format!("waiting for '{command}'"))?,
            Err(_) => bail!("command timed out after {}s", timeout.as_secs()),
        };

        let mut text = String::new();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim_end().to_owned();

        let mut result = if text.is_empty() {
            "(no output)".to_owned()
        } else {
            text
        };
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            result.push_str(&format!("\n(exit code: {code})"));
        }
        Ok(Value::String(result))
    }
}
