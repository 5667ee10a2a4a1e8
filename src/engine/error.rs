use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(String),

    #[error("engine did not accept connections within {0} seconds")]
    StartTimeout(u64),

    #[error("engine query timed out after {0} seconds")]
    QueryTimeout(u64),

    #[error("engine reported an error: {0}")]
    Query(String),

    #[error("invalid engine reply: {0}")]
    InvalidReply(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
