use serde_json::Value;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::debug;

use crate::config::{Settings, SharedSettings};
use crate::documents::DocumentStore;
use crate::engine::{self, EngineClient, EngineSpec, StartOutcome};
use crate::lsp::commands::Command;
use crate::lsp::handlers;
use crate::state::SharedState;

#[derive(Clone)]
pub struct Backend {
    pub(crate) client: Client,
    pub(crate) state: SharedState,
    pub(crate) documents: DocumentStore,
    pub(crate) settings: SharedSettings,
    pub(crate) engine: EngineClient,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::build(client, SharedState::default(), Settings::default())
    }

    /// Constructor with injectable state and settings, used by tests to
    /// point the server at a prepared session.
    pub fn build(client: Client, state: SharedState, settings: Settings) -> Self {
        Self {
            client,
            state,
            documents: DocumentStore::default(),
            settings: SharedSettings::new(settings),
            engine: EngineClient::default(),
        }
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(false),
                    })),
                    ..Default::default()
                },
            )),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec![".".to_string()]),
                ..Default::default()
            }),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            definition_provider: Some(OneOf::Left(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            workspace_symbol_provider: Some(OneOf::Left(true)),
            code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: Command::all(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Launches the engine through the bounded retry loop and records the
    /// live handle on success. Attempt outcomes reach the editor as log
    /// notifications; exhaustion leaves the session without an engine.
    pub(crate) async fn engine_start(&self, settings: &Settings) {
        let Some(root) = self.state.read().root_path else {
            self.client
                .log_message(
                    MessageType::ERROR,
                    "Cannot start the Lumen engine without a workspace root",
                )
                .await;
            return;
        };

        let spec = EngineSpec::from_settings(settings, &root);
        let outcome = engine::start_with_retry(
            &self.client,
            settings.start_attempts(),
            settings.retry_delay(),
            || {
                let engine_client = self.engine.clone();
                let spec = spec.clone();
                async move { engine::start(&engine_client, &spec).await }
            },
        )
        .await;

        if let StartOutcome::Started(live) = outcome {
            self.state.modify(|s| s.engine = Some(live));
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.client
            .log_message(MessageType::INFO, "Lumen LSP server initializing")
            .await;

        #[allow(deprecated)]
        let root_path = params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok());
        self.state.modify(|s| s.root_path = root_path);

        if let Some(options) = params.initialization_options {
            self.settings.replace(Settings::new(options));
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "lumen-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Lumen LSP server initialized")
            .await;

        let settings = self.settings.current();
        if !settings.autostart() {
            return;
        }

        let backend = self.clone();
        tokio::spawn(async move { backend.engine_start(&settings).await });
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .log_message(MessageType::INFO, "Lumen LSP server shutting down")
            .await;
        engine::stop(&self.state).await;
        Ok(())
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.settings.replace(Settings::new(params.settings));
        self.client
            .log_message(MessageType::INFO, "Configuration updated")
            .await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        self.documents.open(uri.clone(), params.text_document.text);

        self.client
            .log_message(MessageType::LOG, format!("Document opened: {}", uri))
            .await;

        let uri_ref = &uri;
        self.dispatch(Some(uri_ref), |_settings, state| async move {
            if let Some(info) = state.module_cache.get(uri_ref) {
                debug!("{} is module {}", uri_ref, info.module);
            }
        })
        .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().next_back() {
            self.documents.replace(&params.text_document.uri, change.text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let uri_ref = &uri;
        self.dispatch(Some(uri_ref), |_settings, state| async move {
            self.build_and_publish(&state, uri_ref).await;
        })
        .await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
        debug!("Document closed: {}", params.text_document.uri);
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri.clone();
        let params = &params;
        let result = self
            .dispatch(Some(&uri), |_settings, state| async move {
                handlers::completion(&self.engine, &state, &self.documents, params).await
            })
            .await;
        Ok(handlers::ok_or_log("completion", result))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .clone();
        let params = &params;
        let result = self
            .dispatch(Some(&uri), |_settings, state| async move {
                handlers::hover(&self.engine, &state, &self.documents, params).await
            })
            .await;
        Ok(handlers::ok_or_log("hover", result))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .clone();
        let params = &params;
        let result = self
            .dispatch(Some(&uri), |_settings, state| async move {
                handlers::definition(&self.engine, &state, &self.documents, params).await
            })
            .await;
        Ok(handlers::ok_or_log("definition", result))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri.clone();
        let uri_ref = &uri;
        let result = self
            .dispatch(Some(uri_ref), |_settings, state| async move {
                handlers::document_symbols(&self.engine, &state, uri_ref).await
            })
            .await;
        Ok(handlers::ok_or_log("documentSymbol", result).map(DocumentSymbolResponse::Flat))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let result = self
            .dispatch(None, |_settings, state| async move {
                handlers::workspace_symbols(&self.engine, &state, &params.query).await
            })
            .await;
        Ok(handlers::ok_or_log("workspaceSymbol", result))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri.clone();
        let params = &params;
        let response = self
            .dispatch(Some(&uri), |_settings, _state| async move {
                handlers::code_actions(params)
            })
            .await;
        Ok(response)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let result = self
            .dispatch(None, |settings, state| self.run_command(settings, state, params))
            .await;
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_advertise_the_full_command_set() {
        let capabilities = Backend::server_capabilities();
        let provider = capabilities.execute_command_provider.unwrap();
        assert_eq!(provider.commands, Command::all());
    }

    #[test]
    fn capabilities_use_full_text_sync() {
        let capabilities = Backend::server_capabilities();
        let TextDocumentSyncCapability::Options(options) =
            capabilities.text_document_sync.unwrap()
        else {
            panic!("expected sync options");
        };
        assert_eq!(options.change, Some(TextDocumentSyncKind::FULL));
        assert_eq!(options.open_close, Some(true));
    }
}
