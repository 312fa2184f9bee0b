use thiserror::Error;

use echohub_asr::AsrError;
use echohub_audio::AudioError;
use echohub_llm::LlmError;
use echohub_protocol::{MessageType, ProtocolError};
use echohub_tts::TtsError;
use echohub_vad::VadError;

use crate::session::state::TransitionError;

/// What the session loop does with a failed handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Tear the session down.
    Fatal,
    /// Drop the offending frame, keep going.
    DropFrame,
    /// Abort the current turn, notify the device, keep the session.
    AbortTurn,
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Asr(#[from] AsrError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Session id mismatch")]
    SessionIdMismatch,

    #[error("Message {0} arrived before hello")]
    HandshakeRequired(MessageType),

    #[error("No handler for message type {0}")]
    NoHandler(MessageType),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Recognizer reported failure: {0}")]
    Upstream(String),

    #[error("Shutting down")]
    Cancelled,
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Protocol(ProtocolError::Json(err))
    }
}

impl HubError {
    pub fn recovery(&self) -> Recovery {
        match self {
            HubError::Transport(_)
            | HubError::Protocol(_)
            | HubError::SessionIdMismatch
            | HubError::HandshakeRequired(_)
            | HubError::NoHandler(_)
            | HubError::Cancelled => Recovery::Fatal,

            // A VAD that cannot come up leaves the session deaf; there is
            // no frame to drop yet.
            HubError::Audio(AudioError::Vad(VadError::ModelInitFailed(_))) => Recovery::Fatal,
            HubError::Audio(_) => Recovery::DropFrame,

            HubError::Asr(_)
            | HubError::Llm(_)
            | HubError::Tts(_)
            | HubError::Upstream(_)
            | HubError::Transition(_) => Recovery::AbortTurn,
        }
    }

    /// Alert status for device notification. Transition failures abort
    /// the turn silently; upstream failures tell the user.
    pub fn alert_status(&self) -> Option<&'static str> {
        match self {
            HubError::Asr(_) | HubError::Upstream(_) => Some("asr_error"),
            HubError::Llm(_) => Some("llm_error"),
            HubError::Tts(_) => Some("tts_error"),
            _ => None,
        }
    }
}
