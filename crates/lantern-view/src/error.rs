use lantern_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
