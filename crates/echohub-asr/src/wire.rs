//! The framed binary envelope both directions of the recognizer stream
//! use. Four header bytes pack protocol version, message type, sequence
//! flags, serialization and compression; client frames follow with a
//! length-prefixed payload, server frames with sequence/error prelude
//! fields.

use serde::{Deserialize, Serialize};

use crate::error::AsrError;

pub const PROTOCOL_VERSION: u8 = 0b0001;
pub const HEADER_SIZE_UNITS: u8 = 0b0001; // in 4-byte units

pub const CODE_SUCCESS: u32 = 20_000_000;
pub const CODE_INVALID_REQUEST: u32 = 40_000_001;
pub const CODE_EMPTY_AUDIO: u32 = 45_000_002;
pub const CODE_AUDIO_TOO_SHORT: u32 = 45_000_081;
pub const CODE_AUDIO_FORMAT: u32 = 45_000_151;
pub const CODE_INTERNAL: u32 = 55_000_031;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    FullClientRequest = 0b0001,
    AudioOnlyRequest = 0b0010,
    FullServerResponse = 0b1001,
    ServerError = 0b1111,
}

impl TryFrom<u8> for MessageType {
    type Error = AsrError;

    fn try_from(value: u8) -> Result<Self, AsrError> {
        match value {
            0b0001 => Ok(Self::FullClientRequest),
            0b0010 => Ok(Self::AudioOnlyRequest),
            0b1001 => Ok(Self::FullServerResponse),
            0b1111 => Ok(Self::ServerError),
            other => Err(AsrError::MalformedFrame(format!(
                "unknown message type {other:#06b}"
            ))),
        }
    }
}

/// Sequence indicator carried in the low nibble of byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SequenceFlag {
    NoSequence = 0b0000,
    Positive = 0b0001,
    NegativeLast = 0b0010,
    NegativeWithSequence = 0b0011,
}

impl SequenceFlag {
    pub fn is_last(self) -> bool {
        matches!(self, Self::NegativeLast | Self::NegativeWithSequence)
    }
}

impl TryFrom<u8> for SequenceFlag {
    type Error = AsrError;

    fn try_from(value: u8) -> Result<Self, AsrError> {
        match value {
            0b0000 => Ok(Self::NoSequence),
            0b0001 => Ok(Self::Positive),
            0b0010 => Ok(Self::NegativeLast),
            0b0011 => Ok(Self::NegativeWithSequence),
            other => Err(AsrError::MalformedFrame(format!(
                "unknown sequence flag {other:#06b}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Serialization {
    Json = 0b0000,
    None = 0b0001,
}

impl TryFrom<u8> for Serialization {
    type Error = AsrError;

    fn try_from(value: u8) -> Result<Self, AsrError> {
        match value {
            0b0000 => Ok(Self::Json),
            0b0001 => Ok(Self::None),
            other => Err(AsrError::MalformedFrame(format!(
                "unknown serialization {other:#06b}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0b0000,
    Gzip = 0b0001,
}

impl TryFrom<u8> for Compression {
    type Error = AsrError;

    fn try_from(value: u8) -> Result<Self, AsrError> {
        match value {
            0b0000 => Ok(Self::None),
            0b0001 => Ok(Self::Gzip),
            other => Err(AsrError::MalformedFrame(format!(
                "unknown compression {other:#06b}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_type: MessageType,
    pub flags: SequenceFlag,
    pub serialization: Serialization,
    pub compression: Compression,
}

impl FrameHeader {
    pub fn new(
        message_type: MessageType,
        flags: SequenceFlag,
        serialization: Serialization,
        compression: Compression,
    ) -> Self {
        Self {
            message_type,
            flags,
            serialization,
            compression,
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [
            (PROTOCOL_VERSION << 4) | HEADER_SIZE_UNITS,
            ((self.message_type as u8) << 4) | self.flags as u8,
            ((self.serialization as u8) << 4) | self.compression as u8,
            0,
        ]
    }

    pub fn parse(raw: &[u8]) -> Result<Self, AsrError> {
        if raw.len() < 4 {
            return Err(AsrError::MalformedFrame(format!(
                "header needs 4 bytes, got {}",
                raw.len()
            )));
        }

        Ok(Self {
            message_type: MessageType::try_from(raw[1] >> 4)?,
            flags: SequenceFlag::try_from(raw[1] & 0x0F)?,
            serialization: Serialization::try_from(raw[2] >> 4)?,
            compression: Compression::try_from(raw[2] & 0x0F)?,
        })
    }
}

/// Client → server frame: header, u32 BE payload length, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl ClientFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(raw: &[u8]) -> Result<Self, AsrError> {
        let header = FrameHeader::parse(raw)?;
        if raw.len() < 8 {
            return Err(AsrError::MalformedFrame(format!(
                "client frame needs 8 bytes, got {}",
                raw.len()
            )));
        }
        let len = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]) as usize;
        if raw.len() != 8 + len {
            return Err(AsrError::MalformedFrame(format!(
                "client frame length {} does not match declared {}",
                raw.len(),
                8 + len
            )));
        }
        Ok(Self {
            header,
            payload: raw[8..].to_vec(),
        })
    }
}

/// Server → client frames. Responses carry a sequence number and a
/// length-prefixed payload; errors carry a code and a UTF-8 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Response {
        header: FrameHeader,
        sequence: u32,
        payload: Vec<u8>,
    },
    Error {
        header: FrameHeader,
        code: u32,
        message: String,
    },
}

impl ServerFrame {
    pub fn decode(raw: &[u8]) -> Result<Self, AsrError> {
        let header = FrameHeader::parse(raw)?;
        if raw.len() < 12 {
            return Err(AsrError::MalformedFrame(format!(
                "server frame needs 12 bytes, got {}",
                raw.len()
            )));
        }

        let first = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let second = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;

        match header.message_type {
            MessageType::FullServerResponse => {
                if raw.len() != 12 + second {
                    return Err(AsrError::MalformedFrame(format!(
                        "response length {} does not match declared {}",
                        raw.len(),
                        12 + second
                    )));
                }
                Ok(Self::Response {
                    header,
                    sequence: first,
                    payload: raw[12..].to_vec(),
                })
            }
            MessageType::ServerError => {
                if raw.len() < 12 + second {
                    return Err(AsrError::MalformedFrame(format!(
                        "error frame length {} shorter than declared {}",
                        raw.len(),
                        12 + second
                    )));
                }
                let message = String::from_utf8_lossy(&raw[12..12 + second]).into_owned();
                Ok(Self::Error {
                    header,
                    code: first,
                    message,
                })
            }
            other => Err(AsrError::MalformedFrame(format!(
                "unexpected server frame type {other:?}"
            ))),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Response {
                header,
                sequence,
                payload,
            } => {
                let mut out = Vec::with_capacity(12 + payload.len());
                out.extend_from_slice(&header.to_bytes());
                out.extend_from_slice(&sequence.to_be_bytes());
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
                out
            }
            Self::Error {
                header,
                code,
                message,
            } => {
                let bytes = message.as_bytes();
                let mut out = Vec::with_capacity(12 + bytes.len());
                out.extend_from_slice(&header.to_bytes());
                out.extend_from_slice(&code.to_be_bytes());
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
                out
            }
        }
    }
}

/// Handshake payload of the full client request.
#[derive(Debug, Serialize, Deserialize)]
pub struct FullClientRequest {
    pub user: UserMeta,
    pub audio: AudioMeta,
    pub request: RequestMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserMeta {
    pub uid: String,
    pub did: String,
    pub platform: String,
    pub sdk_version: String,
    pub app_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioMeta {
    pub format: String,
    pub codec: String,
    pub rate: u32,
    pub bits: u32,
    pub channel: u32,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestMeta {
    pub model_name: String,
    pub enable_itn: bool,
    pub enable_punc: bool,
    pub enable_ddc: bool,
    pub show_utterances: bool,
    pub result_type: String,
}

/// JSON body of a full server response.
#[derive(Debug, Default, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub result: RecognitionResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Utterance {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start_time: i32,
    #[serde(default)]
    pub end_time: i32,
    #[serde(default)]
    pub definite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_version_and_size() {
        let header = FrameHeader::new(
            MessageType::FullClientRequest,
            SequenceFlag::NoSequence,
            Serialization::Json,
            Compression::None,
        );
        let bytes = header.to_bytes();
        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[1], 0x10);
        assert_eq!(bytes[2], 0x00);
        assert_eq!(bytes[3], 0x00);
    }

    #[test]
    fn header_round_trip() {
        let header = FrameHeader::new(
            MessageType::AudioOnlyRequest,
            SequenceFlag::NegativeLast,
            Serialization::None,
            Compression::Gzip,
        );
        assert_eq!(FrameHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn client_frame_round_trip() {
        let frame = ClientFrame {
            header: FrameHeader::new(
                MessageType::AudioOnlyRequest,
                SequenceFlag::NoSequence,
                Serialization::None,
                Compression::Gzip,
            ),
            payload: vec![1, 2, 3, 4, 5],
        };
        assert_eq!(ClientFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn server_response_round_trip() {
        let frame = ServerFrame::Response {
            header: FrameHeader::new(
                MessageType::FullServerResponse,
                SequenceFlag::NegativeLast,
                Serialization::Json,
                Compression::None,
            ),
            sequence: 7,
            payload: br#"{"result":{"text":"ok"}}"#.to_vec(),
        };
        assert_eq!(ServerFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn server_error_round_trip() {
        let frame = ServerFrame::Error {
            header: FrameHeader::new(
                MessageType::ServerError,
                SequenceFlag::NoSequence,
                Serialization::Json,
                Compression::None,
            ),
            code: CODE_EMPTY_AUDIO,
            message: "empty audio".to_string(),
        };
        assert_eq!(ServerFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn truncated_server_frame_is_rejected() {
        let frame = ServerFrame::Response {
            header: FrameHeader::new(
                MessageType::FullServerResponse,
                SequenceFlag::NoSequence,
                Serialization::Json,
                Compression::None,
            ),
            sequence: 1,
            payload: vec![0; 32],
        };
        let mut raw = frame.encode();
        raw.truncate(raw.len() - 1);
        assert!(matches!(
            ServerFrame::decode(&raw),
            Err(AsrError::MalformedFrame(_))
        ));
    }

    #[test]
    fn last_flags() {
        assert!(SequenceFlag::NegativeLast.is_last());
        assert!(SequenceFlag::NegativeWithSequence.is_last());
        assert!(!SequenceFlag::NoSequence.is_last());
        assert!(!SequenceFlag::Positive.is_last());
    }

    #[test]
    fn response_payload_parses() {
        let payload: ResponsePayload =
            serde_json::from_slice(br#"{"result":{"text":"hello there"}}"#).unwrap();
        assert_eq!(payload.result.text, "hello there");
    }
}
