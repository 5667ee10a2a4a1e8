//! Shared E2E harness: jsonrpc builders, a notification collector for the
//! server-to-client stream, and a scripted engine on a real TCP port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tower_lsp::jsonrpc::Request;
use tower_lsp::ClientSocket;

use lumen_lsp::config::Settings;
use lumen_lsp::state::{LiveEngine, SharedState};

/// Settings that keep the server from spawning a real engine process.
pub fn test_settings() -> Settings {
    Settings::new(json!({ "lumen": { "engine": { "autostart": false } } }))
}

/// A session already connected to the engine at `port`, rooted at `/ws`.
pub fn state_with_engine(port: u16) -> SharedState {
    let state = SharedState::default();
    state.modify(|s| {
        s.root_path = Some(PathBuf::from("/ws"));
        s.engine = Some(LiveEngine::new(port, || Box::pin(async {})));
    });
    state
}

pub fn create_initialize_request(id: i64) -> Request {
    Request::build("initialize")
        .id(id)
        .params(json!({ "capabilities": {}, "rootUri": "file:///ws" }))
        .finish()
}

pub fn create_initialized_notification() -> Request {
    Request::build("initialized").params(json!({})).finish()
}

pub fn create_did_open_notification(uri: &str, text: &str) -> Request {
    Request::build("textDocument/didOpen")
        .params(json!({
            "textDocument": {
                "uri": uri,
                "languageId": "lumen",
                "version": 1,
                "text": text
            }
        }))
        .finish()
}

pub fn create_did_save_notification(uri: &str) -> Request {
    Request::build("textDocument/didSave")
        .params(json!({ "textDocument": { "uri": uri } }))
        .finish()
}

pub fn create_completion_request(id: i64, uri: &str, line: u32, character: u32) -> Request {
    Request::build("textDocument/completion")
        .id(id)
        .params(json!({
            "textDocument": { "uri": uri },
            "position": { "line": line, "character": character }
        }))
        .finish()
}

pub fn create_hover_request(id: i64, uri: &str, line: u32, character: u32) -> Request {
    Request::build("textDocument/hover")
        .id(id)
        .params(json!({
            "textDocument": { "uri": uri },
            "position": { "line": line, "character": character }
        }))
        .finish()
}

pub fn create_definition_request(id: i64, uri: &str, line: u32, character: u32) -> Request {
    Request::build("textDocument/definition")
        .id(id)
        .params(json!({
            "textDocument": { "uri": uri },
            "position": { "line": line, "character": character }
        }))
        .finish()
}

pub fn create_workspace_symbol_request(id: i64, query: &str) -> Request {
    Request::build("workspace/symbol")
        .id(id)
        .params(json!({ "query": query }))
        .finish()
}

pub fn create_code_action_request(id: i64, uri: &str, diagnostics: Value) -> Request {
    Request::build("textDocument/codeAction")
        .id(id)
        .params(json!({
            "textDocument": { "uri": uri },
            "range": {
                "start": { "line": 0, "character": 0 },
                "end": { "line": 0, "character": 0 }
            },
            "context": { "diagnostics": diagnostics }
        }))
        .finish()
}

pub fn create_execute_command_request(id: i64, command: &str, arguments: Value) -> Request {
    Request::build("workspace/executeCommand")
        .id(id)
        .params(json!({ "command": command, "arguments": arguments }))
        .finish()
}

/// Drains the server-to-client socket into a channel so tests can await
/// specific notifications.
pub fn spawn_notification_collector(mut socket: ClientSocket) -> mpsc::UnboundedReceiver<Request> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(request) = socket.next().await {
            if tx.send(request).is_err() {
                break;
            }
        }
    });
    rx
}

/// Waits up to five seconds for a notification with the given method,
/// discarding everything else on the way.
pub async fn wait_for_notification(
    rx: &mut mpsc::UnboundedReceiver<Request>,
    method: &str,
) -> Option<Request> {
    timeout(Duration::from_secs(5), async {
        while let Some(request) = rx.recv().await {
            if request.method() == method {
                return Some(request);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Like [`wait_for_notification`] but with a short deadline, for asserting
/// that something does NOT arrive.
pub async fn expect_no_notification(
    rx: &mut mpsc::UnboundedReceiver<Request>,
    method: &str,
) -> bool {
    let arrived = timeout(Duration::from_millis(500), async {
        while let Some(request) = rx.recv().await {
            if request.method() == method {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    !arrived
}

/// Waits for a `window/logMessage` notification whose message contains the
/// given fragment.
pub async fn wait_for_log_containing(
    rx: &mut mpsc::UnboundedReceiver<Request>,
    fragment: &str,
) -> Option<Request> {
    timeout(Duration::from_secs(5), async {
        while let Some(request) = rx.recv().await {
            if request.method() == "window/logMessage"
                && let Some(params) = request.params()
                && params["message"].as_str().is_some_and(|m| m.contains(fragment))
            {
                return Some(request);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Unwraps the result value out of a jsonrpc response.
pub fn response_result(response: Option<tower_lsp::jsonrpc::Response>) -> Value {
    let (_, result) = response.expect("expected a response").into_parts();
    result.expect("request returned an error")
}

/// A scripted engine speaking the one-JSON-line-per-connection protocol on
/// a real local port. Responses are keyed by query name and can be swapped
/// mid-test; queries are recorded in arrival order.
pub struct MockEngine {
    pub port: u16,
    queries: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<HashMap<String, Value>>>,
}

impl MockEngine {
    pub async fn start(initial: &[(&str, Value)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let queries = Arc::new(Mutex::new(Vec::new()));
        let responses: Arc<Mutex<HashMap<String, Value>>> = Arc::new(Mutex::new(
            initial
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        ));

        let record = queries.clone();
        let script = responses.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let record = record.clone();
                let script = script.clone();
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut line = String::new();
                    if BufReader::new(read_half).read_line(&mut line).await.is_err() {
                        return;
                    }
                    let Ok(request) = serde_json::from_str::<Value>(&line) else {
                        return;
                    };

                    let name = request["query"].as_str().unwrap_or_default().to_string();
                    record.lock().unwrap().push(name.clone());

                    let scripted = script.lock().unwrap().get(&name).cloned();
                    let reply = match scripted {
                        Some(result) => json!({ "status": "ok", "result": result }),
                        None => {
                            json!({ "status": "error", "error": format!("unhandled query: {}", name) })
                        }
                    };

                    let _ = write_half.write_all(reply.to_string().as_bytes()).await;
                    let _ = write_half.write_all(b"\n").await;
                });
            }
        });

        Self {
            port,
            queries,
            responses,
        }
    }

    /// Replaces the scripted result for one query name.
    pub fn set_response(&self, name: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    /// Makes the engine answer `name` with an error reply.
    pub fn fail_query(&self, name: &str) {
        self.responses.lock().unwrap().remove(name);
    }

    /// Query names in the order they arrived.
    pub fn query_names(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

/// Canned `moduleInfo` result for `/ws/src/Main.lm`.
pub fn main_module_info() -> Value {
    json!({
        "module": "Main",
        "imports": [
            { "module": "Lumen.Prelude" },
            { "module": "Lumen.List", "qualifier": "List" }
        ]
    })
}
