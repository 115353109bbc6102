//! Git tools, thin wrappers over the `git` CLI.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;

use crate::tools::builtin::file_ops::required_str;
use crate::tools::traits::{Tool, ToolCapability};

async fn run_git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .with_context(|| format!("running git {}", args.join(" ")))?;

    let mut text = String::new();
    text.push_str(&String::from_utf8_lossy(&output.stdout));
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let text = text.trim_end().to_owned();

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            if text.is_empty() { "(no output)" } else { &text }
        );
    }
    Ok(if text.is_empty() {
        "(no output)".to_owned()
    } else {
        text
    })
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }
    fn description(&self) -> &str {
        "Show the working tree status (git status --short --branch)."
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(Value::String(run_git(&["status", "--short", "--branch"]).await?))
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }
    fn description(&self) -> &str {
        "Show unstaged changes, or staged changes with staged=true."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "staged": {"type": "boolean", "description": "Diff the index instead of the working tree"}
            }
        })
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let staged = args.get("staged").and_then(Value::as_bool).unwrap_or(false);
        let output = if staged {
            run_git(&["diff", "--cached"]).await?
        } else {
            run_git(&["diff"]).await?
        };
        Ok(Value::String(output))
    }
}

pub struct GitLogTool;

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }
    fn description(&self) -> &str {
        "Show recent commits, one line each (default 10)."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer", "description": "Number of commits to show"}
            }
        })
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let count = args.get("count").and_then(Value::as_u64).unwrap_or(10);
        let count_arg = format!("-{count}");
        Ok(Value::String(run_git(&["log", "--oneline", &count_arg]).await?))
    }
}

pub struct GitAddTool;

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &str {
        "git_add"
    }
    fn description(&self) -> &str {
        "Stage a path for commit."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to stage"}
            },
            "required": ["path"]
        })
    }
    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let path = required_str(&args, "path")?;
        run_git(&["add", "--", path]).await?;
        Ok(Value::String(format!("staged {path}")))
    }
}

pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &str {
        "git_commit"
    }
    fn description(&self) -> &str {
        "Create a commit from the staged changes."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Commit message"}
            },
            "required": ["message"]
        })
    }
    fn capability(&self) -> ToolCapability {
        ToolCapability::Mutating
    }
    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("message").and_then(Value::as_str).map(str::to_owned)
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let message = required_str(&args, "message")?;
        Ok(Value::String(run_git(&["commit", "-m", message]).await?))
    }
}
