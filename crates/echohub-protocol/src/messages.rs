use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Binary audio frames; never produced by JSON recognition.
    RawAudio,
    Hello,
    ListenStart,
    ListenStop,
    ListenDetect,
    TtsStart,
    TtsStop,
    TtsSentenceStart,
    Abort,
    IotDescribe,
    IotStates,
    Llm,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RawAudio => "raw_audio",
            Self::Hello => "hello",
            Self::ListenStart => "listen_start",
            Self::ListenStop => "listen_stop",
            Self::ListenDetect => "listen_detect",
            Self::TtsStart => "tts_start",
            Self::TtsStop => "tts_stop",
            Self::TtsSentenceStart => "tts_sentence_start",
            Self::Abort => "abort",
            Self::IotDescribe => "iot_describe",
            Self::IotStates => "iot_states",
            Self::Llm => "llm",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    None,
    Auto,
    Manual,
    Realtime,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Websocket,
    Mqtt,
}

/// Discriminator envelope read before the typed payload. Message identity
/// hangs on `type` plus, for the listen/tts families, `state`, and for
/// iot on which payload field is present.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub descriptors: Option<String>,
    #[serde(default)]
    pub states: Option<String>,
}

impl MetaMessage {
    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        match (self.kind.as_str(), self.state.as_str()) {
            ("hello", _) => Ok(MessageType::Hello),
            ("listen", "start") => Ok(MessageType::ListenStart),
            ("listen", "stop") => Ok(MessageType::ListenStop),
            ("listen", "detect") => Ok(MessageType::ListenDetect),
            ("tts", "start") => Ok(MessageType::TtsStart),
            ("tts", "stop") => Ok(MessageType::TtsStop),
            ("tts", "sentence_start") => Ok(MessageType::TtsSentenceStart),
            ("abort", _) => Ok(MessageType::Abort),
            ("llm", _) => Ok(MessageType::Llm),
            ("iot", _) if self.descriptors.is_some() => Ok(MessageType::IotDescribe),
            ("iot", _) if self.states.is_some() => Ok(MessageType::IotStates),
            _ => Err(ProtocolError::UnknownMessageType(self.kind.clone())),
        }
    }
}

pub fn from_json<T: DeserializeOwned>(raw: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(raw)?)
}

/// Negotiated at hello, immutable afterwards. The format string is
/// echoed back verbatim in the hello reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub format: String,
    pub channels: u8,
    pub frame_duration: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            format: "opus".to_string(),
            channels: 1,
            frame_duration: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub mcp: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub version: i32,
    pub transport: TransportKind,
    #[serde(default)]
    pub features: Features,
    pub audio_params: AudioParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenStart {
    #[serde(default)]
    pub session_id: String,
    pub mode: AudioMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenStop {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenDetect {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Abort {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IotDescribe {
    #[serde(default)]
    pub session_id: String,
    pub descriptors: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IotStates {
    #[serde(default)]
    pub session_id: String,
    pub states: String,
}
