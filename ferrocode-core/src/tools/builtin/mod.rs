//! Builtin tool implementations and their registration.

pub mod file_ops;
pub mod git;
pub mod search;
pub mod shell;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::ToolsConfig;
use crate::tools::registry::{ToolProvenance, ToolRegistry};
use crate::tools::traits::Tool;

/// A scratchpad for the model to reason in; the content is not acted on.
pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Record a thought or plan. Has no side effects; use it to reason before acting."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {"type": "string", "description": "The thought to record"}
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(Value::String("ok".to_owned()))
    }
}

/// Register the full builtin tool set in its canonical order.
pub fn register_builtin_tools(registry: &ToolRegistry, config: &ToolsConfig) -> Result<()> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(file_ops::ReadTool),
        Arc::new(file_ops::WriteTool),
        Arc::new(file_ops::EditTool),
        Arc::new(file_ops::PatchTool),
        Arc::new(file_ops::LsTool),
        Arc::new(search::GrepTool),
        Arc::new(search::GlobTool),
        Arc::new(search::FindTool),
        Arc::new(shell::BashTool::new(Duration::from_secs(
            config.bash_timeout_secs,
        ))),
        Arc::new(web::FetchTool::new()),
        Arc::new(git::GitStatusTool),
        Arc::new(git::GitDiffTool),
        Arc::new(git::GitLogTool),
        Arc::new(git::GitAddTool),
        Arc::new(git::GitCommitTool),
        Arc::new(ThinkTool),
    ];
    for tool in tools {
        registry.register(tool, ToolProvenance::Builtin)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_registers_cleanly() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, &ToolsConfig::default()).unwrap();
        let names = registry.names();
        assert!(names.contains(&"read".to_owned()));
        assert!(names.contains(&"patch".to_owned()));
        assert!(names.contains(&"bash".to_owned()));
        assert!(names.contains(&"git_commit".to_owned()));
        assert_eq!(names.len(), 16);
    }
}
