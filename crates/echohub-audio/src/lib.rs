//! Audio path for the hub: decoding inbound opus frames, carving voiced
//! segments out of the PCM stream, and re-encoding synthesized PCM into
//! fixed-duration opus frames for delivery.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod segmenter;

pub use decoder::FrameDecoder;
pub use encoder::{EncodedFrame, FrameEncoder};
pub use error::AudioError;
pub use segmenter::{SegmentFrame, Segmenter, SegmenterConfig};
