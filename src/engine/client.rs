//! TCP query client for the analysis engine.
//!
//! The engine serves one query per connection: connect, write a JSON line,
//! read a JSON line back. Queries are independent, so there is no connection
//! state to manage and a dead engine simply surfaces as a failed connect.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::engine::error::EngineError;
use crate::engine::protocol::{
    Candidate, CompleteOutcome, EngineIssue, ImportEdit, LoadOutcome, ModuleInfo, Query,
    RebuildOutcome, Reply, ReplyStatus, SymbolEntry, SymbolsOutcome, TypeInfo,
};

/// Default timeout for a single engine query (seconds).
const QUERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct EngineClient {
    timeout: Duration,
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(QUERY_TIMEOUT_SECS))
    }
}

impl EngineClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Warm-up query; proves the engine answers, not just accepts.
    pub async fn load(&self, port: u16) -> Result<LoadOutcome, EngineError> {
        self.send(port, &Query::Load).await
    }

    pub async fn module_info(
        &self,
        port: u16,
        file: &Path,
        text: &str,
    ) -> Result<ModuleInfo, EngineError> {
        let file = file.to_string_lossy();
        self.send(port, &Query::ModuleInfo { file: &file, text }).await
    }

    pub async fn rebuild(
        &self,
        port: u16,
        file: &Path,
        text: &str,
    ) -> Result<Vec<EngineIssue>, EngineError> {
        let file = file.to_string_lossy();
        let outcome: RebuildOutcome = self.send(port, &Query::Rebuild { file: &file, text }).await?;
        Ok(outcome.issues)
    }

    pub async fn complete(
        &self,
        port: u16,
        file: &Path,
        prefix: &str,
    ) -> Result<Vec<Candidate>, EngineError> {
        let file = file.to_string_lossy();
        let outcome: CompleteOutcome =
            self.send(port, &Query::Complete { file: &file, prefix }).await?;
        Ok(outcome.candidates)
    }

    pub async fn type_info(
        &self,
        port: u16,
        file: &Path,
        name: &str,
    ) -> Result<Option<TypeInfo>, EngineError> {
        let file = file.to_string_lossy();
        self.send(port, &Query::TypeInfo { file: &file, name }).await
    }

    pub async fn symbols(
        &self,
        port: u16,
        query: &str,
        file: Option<&Path>,
    ) -> Result<Vec<SymbolEntry>, EngineError> {
        let file = file.map(Path::to_string_lossy);
        let outcome: SymbolsOutcome = self
            .send(
                port,
                &Query::Symbols {
                    query,
                    file: file.as_deref(),
                },
            )
            .await?;
        Ok(outcome.symbols)
    }

    pub async fn import_text(
        &self,
        port: u16,
        file: &Path,
        text: &str,
        module: &str,
        qualifier: Option<&str>,
    ) -> Result<ImportEdit, EngineError> {
        let file = file.to_string_lossy();
        self.send(
            port,
            &Query::ImportText {
                file: &file,
                text,
                module,
                qualifier,
            },
        )
        .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        port: u16,
        query: &Query<'_>,
    ) -> Result<T, EngineError> {
        let payload = serde_json::to_string(query)?;
        debug!("Engine query on port {}: {}", port, payload);

        let line = timeout(self.timeout, roundtrip(port, &payload))
            .await
            .map_err(|_| EngineError::QueryTimeout(self.timeout.as_secs()))??;

        let reply: Reply =
            serde_json::from_str(&line).map_err(|e| EngineError::InvalidReply(e.to_string()))?;

        match reply.status {
            ReplyStatus::Ok => serde_json::from_value(reply.result)
                .map_err(|e| EngineError::InvalidReply(e.to_string())),
            ReplyStatus::Error => Err(EngineError::Query(
                reply.error.unwrap_or_else(|| "unknown engine error".to_string()),
            )),
        }
    }
}

async fn roundtrip(port: u16, payload: &str) -> Result<String, EngineError> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(payload.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await?;

    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await?;
    if line.trim().is_empty() {
        return Err(EngineError::InvalidReply(
            "connection closed before reply".to_string(),
        ));
    }
    Ok(line)
}
