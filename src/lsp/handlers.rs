//! Engine-backed request handlers.
//!
//! The analysis itself lives in the engine; these handlers translate LSP
//! requests into queries and query results into LSP shapes. Every handler
//! degrades to an empty answer when no engine is live.

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, CodeActionParams, CodeActionResponse,
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, Diagnostic,
    Documentation, GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents,
    HoverParams, Location, MarkupContent, MarkupKind, Position, Range, SymbolInformation,
    SymbolKind, TextEdit, Url, WorkspaceEdit,
};
use tracing::warn;

use crate::documents::{self, DocumentStore};
use crate::engine::EngineClient;
use crate::engine::error::EngineError;
use crate::engine::protocol::{Candidate, CandidateKind, IssueFix, SymbolEntry};
use crate::lsp::diagnostics::lsp_position;
use crate::state::SessionState;

/// Collapses a handler result per the error contract: engine failures are
/// logged and surface to the editor as an empty answer, never as a
/// protocol-level error.
pub fn ok_or_log<T>(what: &str, result: Result<Option<T>, EngineError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("{} failed: {}", what, e);
            None
        }
    }
}

pub async fn completion(
    engine: &EngineClient,
    state: &SessionState,
    documents: &DocumentStore,
    params: &CompletionParams,
) -> Result<Option<CompletionResponse>, EngineError> {
    let Some(port) = state.engine_port() else {
        return Ok(None);
    };
    let uri = &params.text_document_position.text_document.uri;
    let (Some(text), Ok(path)) = (documents.text(uri), uri.to_file_path()) else {
        return Ok(None);
    };

    let prefix = documents::prefix_at(&text, params.text_document_position.position);
    if prefix.is_empty() {
        return Ok(None);
    }

    let candidates = engine.complete(port, &path, &prefix).await?;
    if candidates.is_empty() {
        return Ok(None);
    }
    let items = candidates.into_iter().map(completion_item).collect();
    Ok(Some(CompletionResponse::Array(items)))
}

fn completion_item(candidate: Candidate) -> CompletionItem {
    let kind = match candidate.kind {
        CandidateKind::Value => CompletionItemKind::FUNCTION,
        CandidateKind::Type => CompletionItemKind::STRUCT,
        CandidateKind::Module => CompletionItemKind::MODULE,
    };
    CompletionItem {
        label: candidate.name,
        kind: Some(kind),
        detail: candidate.ty,
        documentation: candidate
            .module
            .map(|module| Documentation::String(format!("From {}", module))),
        ..Default::default()
    }
}

pub async fn hover(
    engine: &EngineClient,
    state: &SessionState,
    documents: &DocumentStore,
    params: &HoverParams,
) -> Result<Option<Hover>, EngineError> {
    let Some(port) = state.engine_port() else {
        return Ok(None);
    };
    let uri = &params.text_document_position_params.text_document.uri;
    let (Some(text), Ok(path)) = (documents.text(uri), uri.to_file_path()) else {
        return Ok(None);
    };
    let Some(name) =
        documents::identifier_at(&text, params.text_document_position_params.position)
    else {
        return Ok(None);
    };

    let Some(info) = engine.type_info(port, &path, &name).await? else {
        return Ok(None);
    };

    let mut value = format!("```lumen\n{} :: {}\n```", info.name, info.ty);
    if let Some(module) = &info.module {
        value.push_str(&format!("\n\nDefined in `{}`", module));
    }

    Ok(Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    }))
}

pub async fn definition(
    engine: &EngineClient,
    state: &SessionState,
    documents: &DocumentStore,
    params: &GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>, EngineError> {
    let Some(port) = state.engine_port() else {
        return Ok(None);
    };
    let uri = &params.text_document_position_params.text_document.uri;
    let (Some(text), Ok(path)) = (documents.text(uri), uri.to_file_path()) else {
        return Ok(None);
    };
    let Some(name) =
        documents::identifier_at(&text, params.text_document_position_params.position)
    else {
        return Ok(None);
    };

    let Some(info) = engine.type_info(port, &path, &name).await? else {
        return Ok(None);
    };
    let Some(defined_at) = info.defined_at else {
        return Ok(None);
    };
    let Ok(target) = Url::from_file_path(&defined_at.file) else {
        return Ok(None);
    };

    let position = Position::new(
        defined_at.line.saturating_sub(1),
        defined_at.column.saturating_sub(1),
    );
    Ok(Some(GotoDefinitionResponse::Scalar(Location::new(
        target,
        Range::new(position, position),
    ))))
}

pub async fn document_symbols(
    engine: &EngineClient,
    state: &SessionState,
    uri: &Url,
) -> Result<Option<Vec<SymbolInformation>>, EngineError> {
    let Some(port) = state.engine_port() else {
        return Ok(None);
    };
    let Ok(path) = uri.to_file_path() else {
        return Ok(None);
    };

    let entries = engine.symbols(port, "", Some(&path)).await?;
    Ok(symbol_information(entries))
}

pub async fn workspace_symbols(
    engine: &EngineClient,
    state: &SessionState,
    query: &str,
) -> Result<Option<Vec<SymbolInformation>>, EngineError> {
    let Some(port) = state.engine_port() else {
        return Ok(None);
    };

    let entries = engine.symbols(port, query, None).await?;
    Ok(symbol_information(entries))
}

#[allow(deprecated)]
fn symbol_information(entries: Vec<SymbolEntry>) -> Option<Vec<SymbolInformation>> {
    let symbols: Vec<SymbolInformation> = entries
        .into_iter()
        .filter_map(|entry| {
            let uri = Url::from_file_path(&entry.file).ok()?;
            let position = Position::new(
                entry.line.saturating_sub(1),
                entry.column.saturating_sub(1),
            );
            let kind = match entry.kind {
                CandidateKind::Value => SymbolKind::FUNCTION,
                CandidateKind::Type => SymbolKind::STRUCT,
                CandidateKind::Module => SymbolKind::MODULE,
            };
            Some(SymbolInformation {
                name: entry.name,
                kind,
                tags: None,
                deprecated: None,
                location: Location::new(uri, Range::new(position, position)),
                container_name: entry.module,
            })
        })
        .collect();

    if symbols.is_empty() { None } else { Some(symbols) }
}

/// Rebuilds quick-fix actions from the fixes the diagnostics carry. Pure:
/// everything needed already rode along in `Diagnostic::data`.
pub fn code_actions(params: &CodeActionParams) -> Option<CodeActionResponse> {
    let uri = &params.text_document.uri;
    let actions: Vec<CodeActionOrCommand> = params
        .context
        .diagnostics
        .iter()
        .filter_map(|diagnostic| quick_fix(uri, diagnostic))
        .collect();

    if actions.is_empty() { None } else { Some(actions) }
}

fn quick_fix(uri: &Url, diagnostic: &Diagnostic) -> Option<CodeActionOrCommand> {
    let fix: IssueFix = serde_json::from_value(diagnostic.data.clone()?).ok()?;

    let edit = TextEdit::new(
        Range::new(lsp_position(fix.start), lsp_position(fix.end)),
        fix.replacement,
    );
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), vec![edit]);

    Some(CodeActionOrCommand::CodeAction(CodeAction {
        title: fix.title,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        ..Default::default()
    }))
}
