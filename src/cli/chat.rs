//! One-shot and interactive chat handlers.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Result;
use ferrocode_core::config::FerrocodeConfig;
use ferrocode_core::session::SessionStore;
use ferrocode_core::tools::{PermissionGate, PermissionMode, ToolRegistry};
use ferrocode_core::{AgentRunner, LoopPhase};
use tokio_util::sync::CancellationToken;

/// Assemble the system prompt: identity, working directory, project notes
/// from FERROCODE.md or AGENTS.md when present, and the tool roster.
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    let cwd = std::env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "(unknown)".to_owned());

    let mut prompt = format!(
        "You are ferrocode, a coding agent running in a terminal.\n\
         Working directory: {cwd}\n\
         Use the available tools to inspect and modify the project. Prefer \
         small, verifiable steps: read before you edit, and run checks after \
         you change code. When you are done, answer in plain text without \
         calling tools.\n"
    );

    for candidate in ["FERROCODE.md", "AGENTS.md"] {
        if let Ok(notes) = std::fs::read_to_string(candidate) {
            prompt.push_str(&format!("\nProject notes ({candidate}):\n{notes}\n"));
            break;
        }
    }

    prompt.push_str(&format!("\nAvailable tools: {}\n", registry.names().join(", ")));
    prompt
}

/// Run one prompt to completion and print the final answer.
pub async fn run_once(mut runner: AgentRunner, prompt: &str) -> Result<()> {
    let outcome = run_with_interrupt(&mut runner, prompt).await?;
    println!("{}", outcome.final_text);
    if outcome.phase == LoopPhase::Aborted {
        std::process::exit(1);
    }
    Ok(())
}

/// The interactive chat loop.
pub async fn run_interactive(
    mut runner: AgentRunner,
    gate: Arc<PermissionGate>,
    store: Arc<dyn SessionStore>,
    config: FerrocodeConfig,
) -> Result<()> {
    println!(
        "ferrocode {} | model {} | permissions {} | /help for commands",
        env!("CARGO_PKG_VERSION"),
        runner.model(),
        gate.mode()
    );

    loop {
        let Some(line) = read_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            let mut parts = command.splitn(2, ' ');
            match (parts.next().unwrap_or(""), parts.next()) {
                ("q" | "quit" | "exit", _) => break,
                ("help", _) => print_help(),
                ("usage", _) => {
                    let usage = runner.conversation().usage;
                    println!(
                        "prompt tokens: {}, completion tokens: {}",
                        usage.prompt_tokens, usage.completion_tokens
                    );
                }
                ("c" | "clear", _) => match runner.clear() {
                    Ok(()) => println!("conversation cleared"),
                    Err(err) => println!("failed to clear: {err:#}"),
                },
                ("s" | "sessions", _) => match store.list() {
                    Ok(summaries) if summaries.is_empty() => println!("no sessions"),
                    Ok(summaries) => {
                        for summary in summaries {
                            println!("{:<24} {:>5} turns", summary.id, summary.turns);
                        }
                    }
                    Err(err) => println!("failed to list sessions: {err:#}"),
                },
                ("m" | "model", Some(name)) => match config.resolve_model(name.trim()) {
                    Ok(model) => {
                        runner.set_model(model);
                        println!("model set to {}", runner.model());
                    }
                    Err(err) => println!("{err}"),
                },
                ("m" | "model", None) => println!("{}", runner.model()),
                ("auto", _) => {
                    gate.set_mode(PermissionMode::Auto);
                    println!("permissions: auto");
                }
                ("ask", _) => {
                    gate.set_mode(PermissionMode::Ask);
                    println!("permissions: ask");
                }
                ("strict", _) => {
                    gate.set_mode(PermissionMode::Strict);
                    println!("permissions: strict");
                }
                (other, _) => println!("unknown command /{other}, try /help"),
            }
            continue;
        }

        let outcome = run_with_interrupt(&mut runner, input).await?;
        println!("{}", outcome.final_text);
    }
    Ok(())
}

/// Drive one turn, cancelling it on Ctrl-C instead of killing the process.
async fn run_with_interrupt(
    runner: &mut AgentRunner,
    input: &str,
) -> Result<ferrocode_core::TurnOutcome> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });
    let outcome = runner.run_turn(input, &cancel).await;
    signal.abort();
    outcome
}

async fn read_line() -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut buffer = String::new();
        match std::io::stdin().read_line(&mut buffer) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buffer)),
            Err(err) => Err(err),
        }
    })
    .await??;
    Ok(line)
}

fn print_help() {
    println!(
        "/m [name]      show or switch the model\n\
         /c             clear this session's conversation\n\
         /s             list stored sessions\n\
         /auto          allow all tool calls\n\
         /ask           prompt before mutating tool calls\n\
         /strict        deny mutating tool calls\n\
         /usage         show token usage for this session\n\
         /q             exit"
    );
}
