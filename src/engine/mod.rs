//! Analysis engine integration layer
//! - client.rs: TCP query client
//! - error.rs: engine error taxonomy
//! - lifecycle.rs: process start, bounded retry, deactivation
//! - protocol.rs: wire types for the query protocol

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod protocol;

pub use client::EngineClient;
pub use error::EngineError;
pub use lifecycle::{EngineSpec, Notify, StartOutcome, start, start_with_retry, stop};
