//! LSP protocol layer
//! - backend.rs: LanguageServer trait implementation
//! - commands.rs: named editor commands
//! - diagnostics.rs: save-time build and publish
//! - dispatch.rs: refresh-then-serve request wrapper
//! - handlers.rs: engine-backed request handlers
//! - server.rs: LSP server initialization and lifecycle

pub mod backend;
pub mod commands;
pub mod diagnostics;
pub mod dispatch;
pub mod handlers;
pub mod server;
