use std::path::PathBuf;

use clap::Parser;

/// Language server for the Lumen language.
///
/// Bridges editors to the lumen-engine analysis daemon over LSP.
#[derive(Debug, Parser)]
#[command(name = "lumen-lsp", version, about)]
struct Cli {
    /// Communicate over stdio (the default transport; accepted for editor
    /// compatibility).
    #[arg(long)]
    stdio: bool,

    /// Write logs to this file instead of the default location.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli { stdio: _, log_file } = Cli::parse();
    lumen_lsp::lsp::server::run_server(log_file).await
}
