use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport closed")]
    TransportClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Why a tool call did not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolCallError {
    #[error("tool call `{tool}` timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("{message}")]
    Host { code: i64, message: String },

    #[error("tool `{tool}` failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("failed to send tool call: {0}")]
    Transport(String),

    #[error("tool call `{0}` was abandoned")]
    Abandoned(String),
}
