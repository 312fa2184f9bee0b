//! Wire protocol between devices and the hub.
//!
//! Binary frames carry one compressed audio frame behind a 4-byte
//! envelope; text frames are JSON objects discriminated by `type` (and
//! `state` for the listen/tts families).

pub mod commands;
pub mod error;
pub mod frame;
pub mod messages;

pub use commands::{Command, Emotion, TtsState};
pub use error::ProtocolError;
pub use frame::BinaryFrame;
pub use messages::{
    from_json, Abort, AudioMode, AudioParams, Features, Hello, IotDescribe, IotStates,
    ListenDetect, ListenStart, ListenStop, MessageType, MetaMessage, TransportKind,
};
