//! Permission gating for tool execution.
//!
//! Rules are evaluated in order and the first match wins. When no rule
//! matches, the mode decides: `auto` allows everything, `strict` denies
//! mutating tools, and `ask` defers to an interactive prompt. Approvals
//! granted "always" are remembered for the rest of the session.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::tools::traits::ToolCapability;

/// How unmatched tool calls are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// Prompt before mutating tools.
    #[default]
    Ask,
    /// Allow everything without prompting.
    Auto,
    /// Deny mutating tools outright.
    Strict,
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionMode::Ask => write!(f, "ask"),
            PermissionMode::Auto => write!(f, "auto"),
            PermissionMode::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// A configured rule: tool name plus a glob over the permission target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub tool: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    pub action: RuleAction,
}

fn default_pattern() -> String {
    "*".to_owned()
}

impl PermissionRule {
    fn matches(&self, tool: &str, target: &str) -> bool {
        if self.tool != tool && self.tool != "*" {
            return false;
        }
        glob::Pattern::new(&self.pattern)
            .map(|pattern| pattern.matches(target))
            .unwrap_or(false)
    }
}

/// Outcome of a prompt: deny, allow once, or allow for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    Deny,
    AllowOnce,
    AllowAlways,
}

/// Interactive confirmation seam. The CLI installs a terminal prompt; tests
/// install scripted handlers.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn confirm(&self, tool: &str, target: &str) -> PromptDecision;
}

/// Gate consulted by the executor before every tool call.
pub struct PermissionGate {
    mode: Mutex<PermissionMode>,
    rules: Vec<PermissionRule>,
    session_approvals: Mutex<HashSet<String>>,
    prompt: Option<Arc<dyn PermissionPrompt>>,
}

impl PermissionGate {
    pub fn new(mode: PermissionMode, rules: Vec<PermissionRule>) -> Self {
        Self {
            mode: Mutex::new(mode),
            rules,
            session_approvals: Mutex::new(HashSet::new()),
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn PermissionPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn mode(&self) -> PermissionMode {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: PermissionMode) {
        *self.mode.lock() = mode;
    }

    /// Decide whether a tool call may proceed.
    pub async fn authorize(
        &self,
        tool: &str,
        capability: ToolCapability,
        target: &str,
    ) -> bool {
        for rule in &self.rules {
            if rule.matches(tool, target) {
                debug!(tool, target, action = ?rule.action, "permission rule matched");
                return rule.action == RuleAction::Allow;
            }
        }

        match self.mode() {
            PermissionMode::Auto => true,
            PermissionMode::Strict => capability == ToolCapability::ReadOnly,
            PermissionMode::Ask => {
                if capability == ToolCapability::ReadOnly {
                    return true;
                }
                let approval_key = format!("{tool}:{target}");
                if self.session_approvals.lock().contains(&approval_key) {
                    return true;
                }
                let Some(prompt) = &self.prompt else {
                    // No way to ask: fail closed.
                    return false;
                };
                match prompt.confirm(tool, target).await {
                    PromptDecision::Deny => false,
                    PromptDecision::AllowOnce => true,
                    PromptDecision::AllowAlways => {
                        self.session_approvals.lock().insert(approval_key);
                        true
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedPrompt(PromptDecision);

    #[async_trait]
    impl PermissionPrompt for ScriptedPrompt {
        async fn confirm(&self, _tool: &str, _target: &str) -> PromptDecision {
            self.0
        }
    }

    #[tokio::test]
    async fn auto_mode_allows_mutating_tools() {
        let gate = PermissionGate::new(PermissionMode::Auto, Vec::new());
        assert!(gate.authorize("bash", ToolCapability::Mutating, "rm -rf target").await);
    }

    #[tokio::test]
    async fn strict_mode_denies_mutating_but_allows_reads() {
        let gate = PermissionGate::new(PermissionMode::Strict, Vec::new());
        assert!(!gate.authorize("write", ToolCapability::Mutating, "src/main.rs").await);
        assert!(gate.authorize("read", ToolCapability::ReadOnly, "src/main.rs").await);
    }

    #[tokio::test]
    async fn deny_rule_beats_auto_mode() {
        let rules = vec![PermissionRule {
            tool: "bash".to_owned(),
            pattern: "*rm*".to_owned(),
            action: RuleAction::Deny,
        }];
        let gate = PermissionGate::new(PermissionMode::Auto, rules);
        assert!(!gate.authorize("bash", ToolCapability::Mutating, "rm -rf /").await);
        assert!(gate.authorize("bash", ToolCapability::Mutating, "cargo fmt").await);
    }

    #[tokio::test]
    async fn allow_rule_skips_prompt_in_ask_mode() {
        let rules = vec![PermissionRule {
            tool: "write".to_owned(),
            pattern: "target/*".to_owned(),
            action: RuleAction::Allow,
        }];
        let gate = PermissionGate::new(PermissionMode::Ask, rules);
        assert!(gate.authorize("write", ToolCapability::Mutating, "target/notes.md").await);
    }

    #[tokio::test]
    async fn ask_mode_without_prompt_fails_closed() {
        let gate = PermissionGate::new(PermissionMode::Ask, Vec::new());
        assert!(!gate.authorize("write", ToolCapability::Mutating, "src/lib.rs").await);
    }

    #[tokio::test]
    async fn allow_always_is_remembered_for_the_session() {
        let gate = PermissionGate::new(PermissionMode::Ask, Vec::new())
            .with_prompt(Arc::new(ScriptedPrompt(PromptDecision::AllowAlways)));
        assert!(gate.authorize("write", ToolCapability::Mutating, "notes.md").await);
        assert!(gate.session_approvals.lock().contains("write:notes.md"));
    }
}
