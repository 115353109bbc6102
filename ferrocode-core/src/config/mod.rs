//! Layered TOML configuration with environment overrides.
//!
//! Configuration is merged from, in order of increasing precedence:
//! `~/.ferrocode.toml`, `~/.config/ferrocode.toml`, `./.ferrocode.toml`,
//! then environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tools::permissions::{PermissionMode, PermissionRule};

/// Command line for spawning a single MCP server over stdio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub key: String,
    pub url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            url: "https://openrouter.ai/api/v1/chat/completions".to_owned(),
            model: "xiaomi/mimo-v2-flash:free".to_owned(),
            max_tokens: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding per-session transcript logs.
    pub dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            dir: base.join(".ferrocode").join("sessions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Default timeout for `bash` commands, overridable per call.
    pub bash_timeout_secs: u64,
    /// Hard ceiling for any single tool invocation.
    pub tool_timeout_secs: u64,
    /// Byte fuse applied to tool output before it reaches the model.
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bash_timeout_secs: 60,
            tool_timeout_secs: 120,
            max_output_bytes: 48_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model-call rounds per user input before the loop aborts.
    pub max_rounds: usize,
    /// Approximate token budget for the transcript sent to the model.
    pub context_budget_tokens: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 24,
            context_budget_tokens: 100_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub servers: IndexMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub mode: PermissionMode,
    /// Ordered rules checked before the mode applies; first match wins.
    pub rules: Vec<PermissionRule>,
}

/// Top-level ferrocode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FerrocodeConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub tools: ToolsConfig,
    pub agent: AgentConfig,
    pub mcp: McpConfig,
    pub permissions: PermissionsConfig,
    pub aliases: IndexMap<String, String>,
}

impl Default for FerrocodeConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            tools: ToolsConfig::default(),
            agent: AgentConfig::default(),
            mcp: McpConfig::default(),
            permissions: PermissionsConfig::default(),
            aliases: default_aliases(),
        }
    }
}

fn default_aliases() -> IndexMap<String, String> {
    IndexMap::from([
        ("opus-4.5".to_owned(), "anthropic/claude-opus-4.5".to_owned()),
        ("codex-5.2".to_owned(), "openai/gpt-5.2-codex".to_owned()),
        (
            "gemini-3-flash".to_owned(),
            "google/gemini-3-flash-preview".to_owned(),
        ),
        ("mimo".to_owned(), "xiaomi/mimo-v2-flash:free".to_owned()),
    ])
}

/// Candidate config files, later entries override earlier ones.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".ferrocode.toml"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ferrocode.toml"));
    }
    paths.push(PathBuf::from(".ferrocode.toml"));
    paths
}

/// File-level overlay where every section is optional so partial files merge
/// cleanly over the defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    api: Option<ApiOverlay>,
    session: Option<SessionOverlay>,
    tools: Option<ToolsOverlay>,
    agent: Option<AgentOverlay>,
    mcp: Option<McpConfig>,
    permissions: Option<PermissionsOverlay>,
    aliases: Option<IndexMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionsOverlay {
    mode: Option<PermissionMode>,
    rules: Option<Vec<PermissionRule>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiOverlay {
    key: Option<String>,
    url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionOverlay {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsOverlay {
    bash_timeout_secs: Option<u64>,
    tool_timeout_secs: Option<u64>,
    max_output_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentOverlay {
    max_rounds: Option<usize>,
    context_budget_tokens: Option<usize>,
}

impl FerrocodeConfig {
    /// Load configuration from the standard file locations plus environment
    /// overrides. Unreadable files produce a warning, never a hard failure.
    pub fn load() -> Self {
        let mut config = Self::default();
        for path in config_paths() {
            if !path.is_file() {
                continue;
            }
            match Self::read_overlay(&path) {
                Ok(overlay) => config.apply(overlay),
                Err(err) => warn!("failed to load config from {}: {err:#}", path.display()),
            }
        }
        config.apply_env();
        config
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(api) = overlay.api {
            if let Some(key) = api.key {
                self.api.key = key;
            }
            if let Some(url) = api.url {
                self.api.url = url;
            }
            if let Some(model) = api.model {
                self.api.model = model;
            }
            if let Some(max_tokens) = api.max_tokens {
                self.api.max_tokens = max_tokens;
            }
        }
        if let Some(session) = overlay.session {
            if let Some(dir) = session.dir {
                self.session.dir = dir;
            }
        }
        if let Some(tools) = overlay.tools {
            if let Some(secs) = tools.bash_timeout_secs {
                self.tools.bash_timeout_secs = secs;
            }
            if let Some(secs) = tools.tool_timeout_secs {
                self.tools.tool_timeout_secs = secs;
            }
            if let Some(bytes) = tools.max_output_bytes {
                self.tools.max_output_bytes = bytes;
            }
        }
        if let Some(agent) = overlay.agent {
            if let Some(rounds) = agent.max_rounds {
                self.agent.max_rounds = rounds;
            }
            if let Some(budget) = agent.context_budget_tokens {
                self.agent.context_budget_tokens = budget;
            }
        }
        if let Some(mcp) = overlay.mcp {
            self.mcp.servers.extend(mcp.servers);
        }
        if let Some(permissions) = overlay.permissions {
            if let Some(mode) = permissions.mode {
                self.permissions.mode = mode;
            }
            if let Some(rules) = permissions.rules {
                self.permissions.rules.extend(rules);
            }
        }
        if let Some(aliases) = overlay.aliases {
            self.aliases.extend(aliases);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                self.api.key = key;
            }
        }
        if let Ok(model) = std::env::var("FERROCODE_MODEL") {
            if !model.is_empty() {
                self.api.model = model;
            }
        }
        if let Ok(max_tokens) = std::env::var("FERROCODE_MAX_TOKENS") {
            match max_tokens.parse() {
                Ok(value) => self.api.max_tokens = value,
                Err(_) => warn!("ignoring non-numeric FERROCODE_MAX_TOKENS={max_tokens}"),
            }
        }
    }

    /// Resolve a user-supplied model name through the alias table.
    ///
    /// Names containing a provider prefix (`vendor/model`) are taken as
    /// fully qualified. Anything else must be a known alias; an unknown
    /// alias is a configuration error caught before any network call.
    pub fn resolve_model(&self, name: &str) -> Result<String> {
        if let Some(target) = self.aliases.get(name) {
            return Ok(target.clone());
        }
        if name.contains('/') {
            return Ok(name.to_owned());
        }
        bail!(
            "unknown model alias '{name}' (known aliases: {})",
            self.aliases.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    /// Write an annotated config template to `path`.
    pub fn write_template(path: &Path) -> Result<()> {
        const TEMPLATE: &str = r#"# ferrocode configuration
# Copy this to ~/.ferrocode.toml or .ferrocode.toml in your project.

[api]
# key = "your-openrouter-api-key"  # or set OPENROUTER_API_KEY
model = "xiaomi/mimo-v2-flash:free"
max_tokens = 8192

[tools]
bash_timeout_secs = 60
max_output_bytes = 48000

[agent]
max_rounds = 24

[permissions]
mode = "ask"  # ask | auto | strict
# [[permissions.rules]]
# tool = "bash"
# pattern = "*rm -rf*"
# action = "deny"

[aliases]
opus-4.5 = "anthropic/claude-opus-4.5"
codex-5.2 = "openai/gpt-5.2-codex"
gemini-3-flash = "google/gemini-3-flash-preview"
mimo = "xiaomi/mimo-v2-flash:free"

# MCP servers (optional)
# [mcp.servers.filesystem]
# command = "npx"
# args = ["-y", "@anthropic/mcp-server-filesystem", "/path/to/dir"]
"#;
        std::fs::write(path, TEMPLATE).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_builtin_aliases() {
        let config = FerrocodeConfig::default();
        assert_eq!(
            config.aliases.get("mimo").map(String::as_str),
            Some("xiaomi/mimo-v2-flash:free")
        );
    }

    #[test]
    fn resolve_model_prefers_alias_table() {
        let config = FerrocodeConfig::default();
        assert_eq!(
            config.resolve_model("opus-4.5").unwrap(),
            "anthropic/claude-opus-4.5"
        );
    }

    #[test]
    fn resolve_model_passes_through_qualified_names() {
        let config = FerrocodeConfig::default();
        assert_eq!(
            config.resolve_model("mistralai/devstral-small").unwrap(),
            "mistralai/devstral-small"
        );
    }

    #[test]
    fn resolve_model_rejects_unknown_alias() {
        let config = FerrocodeConfig::default();
        assert!(config.resolve_model("definitely-not-an-alias").is_err());
    }

    #[test]
    fn overlay_merges_partial_sections() {
        let mut config = FerrocodeConfig::default();
        let overlay: ConfigOverlay = toml::from_str(
            r#"
            [api]
            model = "anthropic/claude-opus-4.5"

            [tools]
            bash_timeout_secs = 5
            "#,
        )
        .unwrap();
        config.apply(overlay);
        assert_eq!(config.api.model, "anthropic/claude-opus-4.5");
        assert_eq!(config.tools.bash_timeout_secs, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.api.max_tokens, 8192);
        assert_eq!(config.agent.max_rounds, 24);
    }
}
