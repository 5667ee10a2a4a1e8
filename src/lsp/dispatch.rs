//! Refresh-then-serve request dispatch.
//!
//! Every document-scoped request passes through [`Backend::dispatch`] with
//! its document URI; the module cache for that file is brought up to date
//! before the delegated handler runs, so a handler never observes module
//! metadata older than the request that triggered it. Workspace-scoped
//! requests dispatch with no URI and skip the refresh.

use std::future::Future;

use tower_lsp::lsp_types::{MessageType, Url};
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::error::EngineError;
use crate::lsp::backend::Backend;
use crate::state::SessionState;

impl Backend {
    /// Wraps a request/notification handler: snapshot the settings, refresh
    /// the module cache for the referenced document, then run the handler
    /// over a state snapshot taken after the refresh. A failed refresh is
    /// logged and the handler proceeds on whatever is cached.
    pub(crate) async fn dispatch<F, Fut, T>(&self, uri: Option<&Url>, handler: F) -> T
    where
        F: FnOnce(Settings, SessionState) -> Fut,
        Fut: Future<Output = T>,
    {
        let settings = self.settings.current();

        if let Some(uri) = uri
            && let Err(e) = self.refresh_module_cache(uri).await
        {
            warn!("Module cache refresh for {} failed: {}", uri, e);
        }

        let state = self.state.read();
        handler(settings, state).await
    }

    /// Replaces the module-cache entry for `uri` with fresh metadata from
    /// the engine. Refresh is unconditional per dispatch; there is no
    /// change detection. No-op without a live engine or open document.
    pub(crate) async fn refresh_module_cache(&self, uri: &Url) -> Result<(), EngineError> {
        let Some(port) = self.state.read().engine_port() else {
            return Ok(());
        };
        let Some(text) = self.documents.text(uri) else {
            return Ok(());
        };
        let Ok(path) = uri.to_file_path() else {
            return Ok(());
        };

        let module_info = self.engine.module_info(port, &path, &text).await?;
        let summary = format!(
            "module {} with {} imports",
            module_info.module,
            module_info.imports.len()
        );

        self.state.modify(|s| {
            s.module_cache.insert(uri.clone(), module_info);
        });

        info!("Refreshed module cache for {}: {}", uri, summary);
        self.client
            .log_message(MessageType::INFO, format!("Loaded {}", summary))
            .await;
        Ok(())
    }
}
