//! Tool registry: an ordered map from tool name to implementation.
//!
//! Builtins register first; MCP-discovered tools are merged afterwards and
//! never shadow a local tool with the same name.

use std::sync::Arc;

use anyhow::{Result, bail};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::warn;

use crate::llm::provider::ToolDefinition;
use crate::tools::traits::{Tool, definition_for};

/// Where a registered tool came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolProvenance {
    Builtin,
    Mcp { server: String },
}

struct ToolEntry {
    tool: Arc<dyn Tool>,
    provenance: ToolProvenance,
}

#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<IndexMap<String, ToolEntry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Name collisions resolve in favor of local tools: a
    /// builtin replaces an MCP entry, an MCP tool never replaces a builtin,
    /// and a duplicate within the same provenance is a registration bug.
    pub fn register(&self, tool: Arc<dyn Tool>, provenance: ToolProvenance) -> Result<()> {
        let name = tool.name().to_owned();
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&name) {
            match (&existing.provenance, &provenance) {
                (ToolProvenance::Builtin, ToolProvenance::Mcp { server }) => {
                    warn!(tool = %name, server = %server, "MCP tool shadowed by local tool, skipping");
                    return Ok(());
                }
                (ToolProvenance::Mcp { server }, ToolProvenance::Builtin) => {
                    warn!(tool = %name, server = %server, "local tool replaces MCP tool");
                }
                _ => bail!("tool '{name}' registered twice"),
            }
        }
        entries.insert(name, ToolEntry { tool, provenance });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entries.read().get(name).map(|entry| entry.tool.clone())
    }

    /// Definitions for every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .read()
            .values()
            .map(|entry| definition_for(entry.tool.as_ref()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn provenance(&self, name: &str) -> Option<ToolProvenance> {
        self.entries.read().get(name).map(|entry| entry.provenance.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            Ok(json!("ok"))
        }
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = ToolRegistry::new();
        for name in ["read", "write", "bash"] {
            registry
                .register(Arc::new(NamedTool(name)), ToolProvenance::Builtin)
                .unwrap();
        }
        assert_eq!(registry.names(), vec!["read", "write", "bash"]);
        assert_eq!(registry.definitions().len(), 3);
    }

    #[test]
    fn mcp_tool_never_shadows_builtin() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(NamedTool("read")), ToolProvenance::Builtin)
            .unwrap();
        registry
            .register(
                Arc::new(NamedTool("read")),
                ToolProvenance::Mcp {
                    server: "fs".to_owned(),
                },
            )
            .unwrap();
        assert_eq!(registry.provenance("read"), Some(ToolProvenance::Builtin));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_builtin_is_an_error() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(NamedTool("read")), ToolProvenance::Builtin)
            .unwrap();
        assert!(
            registry
                .register(Arc::new(NamedTool("read")), ToolProvenance::Builtin)
                .is_err()
        );
    }
}
