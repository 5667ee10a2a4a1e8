use std::path::PathBuf;

use tower_lsp::{LspService, Server};
use tracing::info;

use crate::log::init;
use crate::lsp::backend::Backend;

pub async fn run_server(log_file: Option<PathBuf>) -> anyhow::Result<()> {
    init(log_file)?;

    info!("Starting lumen-lsp server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("lumen-lsp server stopped");
    Ok(())
}
