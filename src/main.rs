use anyhow::Result;
use brainstream::cli::{self, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// BrainStream: personal technology-intelligence hub.
///
/// Dual-mode binary: `serve` runs the HTTP API plus the background
/// collection scheduler; the other subcommands are one-shot CLI operations.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Quiet logging for CLI queries, verbose for the server.
    let default_level = if cli.command.is_query_mode() {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(default_level.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    cli::execute(cli).await
}
