use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("Websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Recognition rejected: code {code}: {message}")]
    Rejected { code: u32, message: String },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Audio write timed out")]
    WriteTimeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AsrError {
    /// Rejections are the service refusing the request (bad audio, bad
    /// parameters); everything else is the service being unreachable.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AsrError::Rejected { .. })
    }
}
