//! Save-time diagnostics: engine issues in, published LSP diagnostics out.

use std::path::Path;

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, MessageType, Position, Range, Url,
};
use tracing::{debug, warn};

use crate::engine::protocol::{EngineIssue, EnginePosition, IssueSeverity};
use crate::lsp::backend::Backend;
use crate::state::{SessionState, SharedState};

pub const DIAGNOSTIC_SOURCE: &str = "lumen";

/// Converts a 1-based engine position to a 0-based LSP position.
pub fn lsp_position(position: EnginePosition) -> Position {
    Position::new(
        position.line.saturating_sub(1),
        position.column.saturating_sub(1),
    )
}

pub fn to_diagnostic(issue: &EngineIssue) -> Diagnostic {
    let severity = match issue.severity {
        IssueSeverity::Error => DiagnosticSeverity::ERROR,
        IssueSeverity::Warning => DiagnosticSeverity::WARNING,
        IssueSeverity::Hint => DiagnosticSeverity::HINT,
    };

    // The engine's suggested fix rides along in `data` so codeAction can
    // rebuild a quick fix from the diagnostic alone.
    let data = issue
        .fix
        .as_ref()
        .and_then(|fix| serde_json::to_value(fix).ok());

    Diagnostic {
        range: Range::new(lsp_position(issue.start), lsp_position(issue.end)),
        severity: Some(severity),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: issue.message.clone(),
        data,
        ..Default::default()
    }
}

/// Replaces the cached diagnostics for `uri` with the converted issues and
/// returns the new list. Full replace per key, never a merge.
pub fn replace_for(state: &SharedState, uri: &Url, issues: &[EngineIssue]) -> Vec<Diagnostic> {
    let diagnostics: Vec<Diagnostic> = issues.iter().map(to_diagnostic).collect();
    state.modify(|s| {
        s.diagnostics_cache.insert(uri.clone(), diagnostics.clone());
    });
    diagnostics
}

impl Backend {
    /// Save path: rebuild through the engine, replace the cache entry for
    /// the saved file, publish, and report the count. A failed build is
    /// logged and leaves the previously published diagnostics in place.
    pub(crate) async fn build_and_publish(&self, state: &SessionState, uri: &Url) {
        let Some(port) = state.engine_port() else {
            debug!("No engine running; skipping build for {}", uri);
            return;
        };
        let Some(text) = self.documents.text(uri) else {
            return;
        };
        let Ok(path) = uri.to_file_path() else {
            return;
        };

        let issues = match self.engine.rebuild(port, &path, &text).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!("Build for {} failed: {}", uri, e);
                self.client
                    .log_message(MessageType::WARNING, format!("Build failed: {}", e))
                    .await;
                return;
            }
        };

        // Diagnostics are published per saved document; issues the engine
        // reports against other files are not part of this file's list.
        let issues: Vec<EngineIssue> = issues
            .into_iter()
            .filter(|issue| Path::new(&issue.file) == path)
            .collect();

        let diagnostics = replace_for(&self.state, uri, &issues);
        self.client
            .publish_diagnostics(uri.clone(), diagnostics.clone(), None)
            .await;
        self.client
            .log_message(
                MessageType::INFO,
                format!("Published {} diagnostics for {}", diagnostics.len(), uri),
            )
            .await;
    }
}
