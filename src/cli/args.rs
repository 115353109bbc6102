//! Command-line interface definition.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ferrocode",
    version,
    about = "A terminal coding agent with tool calling, MCP support, and session persistence"
)]
pub struct Cli {
    /// Run a single prompt and exit instead of starting interactive chat
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Session name; conversations resume where they left off
    #[arg(short, long, default_value = "default")]
    pub session: String,

    /// Model to use (an alias like "mimo" or a full "vendor/model" name)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Allow all tool calls without prompting
    #[arg(long)]
    pub auto: bool,

    /// Clear the session transcript and exit
    #[arg(long)]
    pub clear: bool,

    /// List stored sessions and exit
    #[arg(long)]
    pub list_sessions: bool,

    /// Write a config template to .ferrocode.toml and exit
    #[arg(long)]
    pub init_config: bool,
}
