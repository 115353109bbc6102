//! ferrocode: a terminal coding agent.
//!
//! Thin binary entry point; all behavior lives in the CLI handlers.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ferrocode=warn,ferrocode_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    cli::run(args).await
}
