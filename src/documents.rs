//! Open-document text store.
//!
//! The server syncs full document text (open/change/close) and the engine
//! queries are fed from this store rather than from disk, so unsaved edits
//! are visible to the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tower_lsp::lsp_types::{Position, Url};

/// Per-URI text of every open document.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Mutex<HashMap<Url, String>>>,
}

impl DocumentStore {
    pub fn open(&self, uri: Url, text: String) {
        self.inner.lock().unwrap().insert(uri, text);
    }

    /// Full-sync change: the new text replaces the old wholesale.
    pub fn replace(&self, uri: &Url, text: String) {
        self.inner.lock().unwrap().insert(uri.clone(), text);
    }

    pub fn close(&self, uri: &Url) {
        self.inner.lock().unwrap().remove(uri);
    }

    pub fn text(&self, uri: &Url) -> Option<String> {
        self.inner.lock().unwrap().get(uri).cloned()
    }
}

fn is_ident_char(c: char) -> bool {
    // Lumen identifiers: alphanumerics, underscore, prime; dots join
    // qualified names (List.map, L.foldr).
    c.is_alphanumeric() || c == '_' || c == '\'' || c == '.'
}

/// The qualified identifier under the cursor, if any.
pub fn identifier_at(text: &str, position: Position) -> Option<String> {
    let line = text.lines().nth(position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let cursor = (position.character as usize).min(chars.len());

    let mut start = cursor;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = cursor;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }

    if start == end {
        return None;
    }
    Some(chars[start..end].iter().collect())
}

/// The partial identifier ending at the cursor, used as completion prefix.
pub fn prefix_at(text: &str, position: Position) -> String {
    let Some(line) = text.lines().nth(position.line as usize) else {
        return String::new();
    };
    let chars: Vec<char> = line.chars().collect();
    let cursor = (position.character as usize).min(chars.len());

    let mut start = cursor;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    chars[start..cursor].iter().collect()
}
