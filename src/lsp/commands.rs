//! Named editor commands.
//!
//! The command set is closed: every name the server advertises maps to one
//! variant here, and anything else is answered with an error notification
//! and a JSON `null` result.

use serde_json::Value;
use tower_lsp::lsp_types::{
    ExecuteCommandParams, MessageType, Position, Range, TextEdit, Url, WorkspaceEdit,
};
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::lifecycle;
use crate::lsp::backend::Backend;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Rebuild a file and republish its diagnostics.
    Build,
    /// Launch the engine (bounded retry) if none is running.
    StartEngine,
    /// Deactivate the running engine.
    StopEngine,
    /// Deactivate, then launch again.
    RestartEngine,
    /// Add an import to a document via the engine's import rewriter.
    AddImport,
}

impl Command {
    pub const NAMES: [&'static str; 5] = [
        "lumen.build",
        "lumen.startEngine",
        "lumen.stopEngine",
        "lumen.restartEngine",
        "lumen.addImport",
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lumen.build" => Some(Self::Build),
            "lumen.startEngine" => Some(Self::StartEngine),
            "lumen.stopEngine" => Some(Self::StopEngine),
            "lumen.restartEngine" => Some(Self::RestartEngine),
            "lumen.addImport" => Some(Self::AddImport),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Build => "lumen.build",
            Self::StartEngine => "lumen.startEngine",
            Self::StopEngine => "lumen.stopEngine",
            Self::RestartEngine => "lumen.restartEngine",
            Self::AddImport => "lumen.addImport",
        }
    }

    /// The advertised command list, as the capability announcement wants it.
    pub fn all() -> Vec<String> {
        Self::NAMES.iter().map(|name| name.to_string()).collect()
    }
}

/// The engine hands back the rewritten import block with a 1-based
/// inclusive line range; the edit replaces those whole lines.
fn import_block_range(edit: &crate::engine::protocol::ImportEdit) -> Range {
    Range::new(
        Position::new(edit.start_line.saturating_sub(1), 0),
        Position::new(edit.end_line, 0),
    )
}

fn uri_arg(args: &[Value], index: usize) -> Option<Url> {
    args.get(index)?.as_str().and_then(|s| Url::parse(s).ok())
}

fn str_arg(args: &[Value], index: usize) -> Option<String> {
    args.get(index)?.as_str().map(str::to_string)
}

impl Backend {
    /// Executes one named command against the dispatch snapshot. Concurrent
    /// invocations run independently; there is no queuing or deduplication.
    pub(crate) async fn run_command(
        &self,
        settings: Settings,
        state: SessionState,
        params: ExecuteCommandParams,
    ) -> Value {
        let Some(command) = Command::from_name(&params.command) else {
            warn!("Unknown command: {}", params.command);
            self.client
                .show_message(
                    MessageType::ERROR,
                    format!("Unknown command: {}", params.command),
                )
                .await;
            return Value::Null;
        };

        info!("Executing command {}", command.name());
        match command {
            Command::Build => self.command_build(&state, &params.arguments).await,
            Command::StartEngine => self.command_start_engine(&settings, &state).await,
            Command::StopEngine => {
                lifecycle::stop(&self.state).await;
                Value::Null
            }
            Command::RestartEngine => {
                lifecycle::stop(&self.state).await;
                self.engine_start(&settings).await;
                Value::Null
            }
            Command::AddImport => self.command_add_import(&state, &params.arguments).await,
        }
    }

    async fn command_build(&self, state: &SessionState, args: &[Value]) -> Value {
        let Some(uri) = uri_arg(args, 0) else {
            self.client
                .show_message(MessageType::ERROR, "lumen.build expects a document URI")
                .await;
            return Value::Null;
        };
        self.build_and_publish(state, &uri).await;
        Value::Null
    }

    async fn command_start_engine(&self, settings: &Settings, state: &SessionState) -> Value {
        if let Some(port) = state.engine_port() {
            info!("Engine already running on port {}", port);
            self.client
                .log_message(
                    MessageType::INFO,
                    format!("Lumen engine already running on port {}", port),
                )
                .await;
            return Value::Null;
        }
        self.engine_start(settings).await;
        Value::Null
    }

    async fn command_add_import(&self, state: &SessionState, args: &[Value]) -> Value {
        let (Some(uri), Some(module)) = (uri_arg(args, 0), str_arg(args, 1)) else {
            self.client
                .show_message(
                    MessageType::ERROR,
                    "lumen.addImport expects a document URI and a module name",
                )
                .await;
            return Value::Null;
        };
        let qualifier = str_arg(args, 2);

        let Some(port) = state.engine_port() else {
            self.client
                .show_message(MessageType::WARNING, "Lumen engine is not running")
                .await;
            return Value::Null;
        };
        let Some(text) = self.documents.text(&uri) else {
            return Value::Null;
        };
        let Ok(path) = uri.to_file_path() else {
            return Value::Null;
        };

        let edit = match self
            .engine
            .import_text(port, &path, &text, &module, qualifier.as_deref())
            .await
        {
            Ok(edit) => edit,
            Err(e) => {
                warn!("addImport for {} failed: {}", uri, e);
                self.client
                    .show_message(MessageType::ERROR, format!("Could not add import: {}", e))
                    .await;
                return Value::Null;
            }
        };

        let edits = vec![TextEdit::new(import_block_range(&edit), edit.text)];
        let workspace_edit = WorkspaceEdit {
            changes: Some([(uri.clone(), edits)].into_iter().collect()),
            ..Default::default()
        };

        match self.client.apply_edit(workspace_edit).await {
            Ok(response) if !response.applied => {
                warn!("Editor rejected import edit for {}", uri);
            }
            Err(e) => warn!("applyEdit for {} failed: {}", uri, e),
            Ok(_) => {}
        }
        Value::Null
    }
}
