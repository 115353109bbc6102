//! CLI handlers: argument dispatch, agent assembly, and the chat loop.

pub mod args;
mod chat;
mod prompt;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ferrocode_core::config::FerrocodeConfig;
use ferrocode_core::llm::{LLMClient, OpenRouterProvider};
use ferrocode_core::mcp::McpConnections;
use ferrocode_core::session::{JsonlSessionStore, SessionStore};
use ferrocode_core::tools::builtin::register_builtin_tools;
use ferrocode_core::tools::{PermissionGate, PermissionMode, ToolExecutor, ToolRegistry};
use ferrocode_core::AgentRunner;
use std::time::Duration;

use args::Cli;

pub async fn run(args: Cli) -> Result<()> {
    let mut config = FerrocodeConfig::load();

    if args.init_config {
        let path = Path::new(".ferrocode.toml");
        if path.exists() {
            anyhow::bail!(".ferrocode.toml already exists");
        }
        FerrocodeConfig::write_template(path)?;
        println!("wrote .ferrocode.toml");
        return Ok(());
    }

    let store = JsonlSessionStore::new(config.session.dir.clone());

    if args.list_sessions {
        let summaries = store.list()?;
        if summaries.is_empty() {
            println!("no sessions");
            return Ok(());
        }
        for summary in summaries {
            let updated = summary
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_owned());
            println!("{:<24} {:>5} turns  {updated}", summary.id, summary.turns);
        }
        return Ok(());
    }

    if args.clear {
        store.clear(&args.session)?;
        println!("cleared session '{}'", args.session);
        return Ok(());
    }

    if args.auto {
        config.permissions.mode = PermissionMode::Auto;
    }

    let model = match &args.model {
        Some(name) => config.resolve_model(name)?,
        None => config.resolve_model(&config.api.model).unwrap_or_else(|_| config.api.model.clone()),
    };

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry, &config.tools)?;
    let mcp = McpConnections::connect_all(&config.mcp, &registry).await;

    let mut gate = PermissionGate::new(
        config.permissions.mode,
        config.permissions.rules.clone(),
    );
    // One-shot mode has no terminal to ask on; interactive installs a prompt.
    if args.prompt.is_none() {
        gate = gate.with_prompt(Arc::new(prompt::TerminalPrompt));
    }
    let gate = Arc::new(gate);

    let executor = ToolExecutor::new(
        registry.clone(),
        gate.clone(),
        Duration::from_secs(config.tools.tool_timeout_secs),
        config.tools.max_output_bytes,
    );

    let provider = OpenRouterProvider::new(config.api.key.clone(), config.api.url.clone());
    let client = LLMClient::new(
        Box::new(provider),
        model,
        config.api.max_tokens,
        config.agent.context_budget_tokens,
    );

    let store: Arc<dyn SessionStore> = Arc::new(store);
    let runner = AgentRunner::new(
        client,
        registry.clone(),
        executor,
        store.clone(),
        args.session.clone(),
        chat::build_system_prompt(&registry),
        config.agent.max_rounds,
    )
    .context("starting session")?;

    let result = match args.prompt {
        Some(prompt) => chat::run_once(runner, &prompt).await,
        None => chat::run_interactive(runner, gate, store, config).await,
    };
    mcp.shutdown().await;
    result
}
