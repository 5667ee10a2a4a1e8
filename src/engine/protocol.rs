//! Wire types for the engine query protocol.
//!
//! One JSON object per line in each direction. A query is
//! `{"query": <name>, "params": {...}}`; the engine answers with
//! `{"status": "ok", "result": ...}` or `{"status": "error", "error": "..."}`.
//! Positions on the wire are 1-based; conversion to LSP's 0-based positions
//! happens at the LSP layer.

use serde::{Deserialize, Serialize};

/// A single engine query.
#[derive(Debug, Serialize)]
#[serde(tag = "query", content = "params", rename_all = "camelCase")]
pub enum Query<'a> {
    /// Warm-up: makes the engine load the workspace modules. Doubles as the
    /// responsiveness probe after process start.
    Load,
    ModuleInfo {
        file: &'a str,
        text: &'a str,
    },
    Rebuild {
        file: &'a str,
        text: &'a str,
    },
    Complete {
        file: &'a str,
        prefix: &'a str,
    },
    TypeInfo {
        file: &'a str,
        name: &'a str,
    },
    Symbols {
        query: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<&'a str>,
    },
    ImportText {
        file: &'a str,
        text: &'a str,
        module: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        qualifier: Option<&'a str>,
    },
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Envelope of every engine reply.
#[derive(Debug, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadOutcome {
    #[serde(default)]
    pub modules: usize,
}

/// A file's resolved module name and imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module: String,
    #[serde(default)]
    pub imports: Vec<ModuleImport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleImport {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebuildOutcome {
    #[serde(default)]
    pub issues: Vec<EngineIssue>,
}

/// A build issue as the engine reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineIssue {
    pub file: String,
    pub severity: IssueSeverity,
    pub start: EnginePosition,
    pub end: EnginePosition,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<IssueFix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Hint,
}

/// 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePosition {
    pub line: u32,
    pub column: u32,
}

/// Engine-suggested replacement attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFix {
    pub title: String,
    pub replacement: String,
    pub start: EnginePosition,
    pub end: EnginePosition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteOutcome {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Candidate {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub kind: CandidateKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    #[default]
    Value,
    Type,
    Module,
}

/// Answer to a `typeInfo` query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub defined_at: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolsOutcome {
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    #[serde(default)]
    pub kind: CandidateKind,
    #[serde(default)]
    pub module: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Rewritten import block returned by `importText`. The line range is
/// 1-based and inclusive; the replacement text carries its own newlines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdit {
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
}
