use serde::{Deserialize, Serialize};

use crate::messages::{AudioParams, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsState {
    Start,
    Stop,
    SentenceStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Laughing,
    Funny,
    Sad,
    Angry,
    Crying,
    Loving,
    Embarrassed,
    Surprised,
    Shocked,
    Thinking,
    Winking,
    Cool,
    Relaxed,
    Delicious,
    Kissy,
    Confident,
    Sleepy,
    Silly,
    Confused,
}

/// Server-to-device commands. Serializes straight onto the text channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Hello {
        session_id: String,
        transport: TransportKind,
        audio_params: AudioParams,
    },
    Stt {
        session_id: String,
        text: String,
    },
    Llm {
        session_id: String,
        emotion: Emotion,
    },
    Tts {
        state: TtsState,
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    System {
        session_id: String,
        command: String,
    },
    Alert {
        session_id: String,
        status: String,
        message: String,
        emotion: Emotion,
    },
}

impl Command {
    pub fn tts_start(session_id: &str) -> Self {
        Self::Tts {
            state: TtsState::Start,
            session_id: session_id.to_string(),
            text: None,
        }
    }

    pub fn tts_stop(session_id: &str) -> Self {
        Self::Tts {
            state: TtsState::Stop,
            session_id: session_id.to_string(),
            text: None,
        }
    }

    pub fn tts_sentence_start(session_id: &str, text: &str) -> Self {
        Self::Tts {
            state: TtsState::SentenceStart,
            session_id: session_id.to_string(),
            text: Some(text.to_string()),
        }
    }

    pub fn stt(session_id: &str, text: &str) -> Self {
        Self::Stt {
            session_id: session_id.to_string(),
            text: text.to_string(),
        }
    }

    pub fn emotion(session_id: &str, emotion: Emotion) -> Self {
        Self::Llm {
            session_id: session_id.to_string(),
            emotion,
        }
    }

    pub fn reboot(session_id: &str) -> Self {
        Self::System {
            session_id: session_id.to_string(),
            command: "reboot".to_string(),
        }
    }

    pub fn alert(session_id: &str, status: &str, message: &str, emotion: Emotion) -> Self {
        Self::Alert {
            session_id: session_id.to_string(),
            status: status.to_string(),
            message: message.to_string(),
            emotion,
        }
    }
}
