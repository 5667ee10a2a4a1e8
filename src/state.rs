//! Shared session state.
//!
//! One mutable record per server process, visible to every request handler.
//! All mutation goes through [`SharedState::modify`], an atomic
//! replace-with-function, so interleaved handlers never lose updates.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tower_lsp::lsp_types::{Diagnostic, Url};

use crate::engine::protocol::ModuleInfo;

type DeactivateFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A running analysis engine: its query port coupled with the action that
/// releases it. The two always travel together, so the port can never
/// outlive its deactivation hook or vice versa.
#[derive(Clone)]
pub struct LiveEngine {
    port: u16,
    deactivate: DeactivateFn,
}

impl LiveEngine {
    pub fn new<F>(port: u16, deactivate: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            port,
            deactivate: Arc::new(deactivate),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Releases the engine this handle points at.
    pub async fn deactivate(&self) {
        (self.deactivate)().await;
    }
}

impl std::fmt::Debug for LiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEngine").field("port", &self.port).finish()
    }
}

/// The session record described in the server's state model.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Workspace root, set once from the initialize handshake.
    pub root_path: Option<PathBuf>,
    /// The live engine, if one is running.
    pub engine: Option<LiveEngine>,
    /// Per-file module metadata, replaced per key on each refresh.
    pub module_cache: IndexMap<Url, ModuleInfo>,
    /// Last published diagnostics per file, replaced per key on each save.
    pub diagnostics_cache: IndexMap<Url, Vec<Diagnostic>>,
}

impl SessionState {
    /// Port of the live engine, if any.
    pub fn engine_port(&self) -> Option<u16> {
        self.engine.as_ref().map(LiveEngine::port)
    }
}

/// Handle to the single session record.
///
/// `read` returns a snapshot that may already be stale; anything written
/// back must be expressed as a partial update inside `modify`, never as a
/// `write` of a snapshot held across an await point.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Snapshot of the current state.
    pub fn read(&self) -> SessionState {
        self.inner.lock().unwrap().clone()
    }

    /// Atomically mutates the state through `f`.
    pub fn modify<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    /// Atomically replaces the whole state.
    pub fn write(&self, state: SessionState) {
        *self.inner.lock().unwrap() = state;
    }
}
