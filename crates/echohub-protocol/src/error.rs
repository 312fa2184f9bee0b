use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: need {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid message payload: {0}")]
    Json(#[from] serde_json::Error),
}
