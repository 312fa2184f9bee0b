use opus::{Channels, Decoder};

use crate::error::AudioError;

/// Stateful opus decoder for the inbound device stream.
///
/// One instance per session; opus keeps up to a frame of lookahead, so the
/// decoder must see the session's frames in order.
pub struct FrameDecoder {
    decoder: Decoder,
    samples_per_frame: usize,
}

impl FrameDecoder {
    pub fn new(sample_rate: u32, frame_duration_ms: u32) -> Result<Self, AudioError> {
        let decoder =
            Decoder::new(sample_rate, Channels::Mono).map_err(AudioError::Decoder)?;
        let samples_per_frame = (sample_rate as usize * frame_duration_ms as usize) / 1000;

        Ok(Self {
            decoder,
            samples_per_frame,
        })
    }

    /// Decode one compressed frame to PCM16 mono.
    pub fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>, AudioError> {
        let mut pcm = vec![0i16; self.samples_per_frame];
        let decoded = self
            .decoder
            .decode(payload, &mut pcm, false)
            .map_err(AudioError::Decoder)?;
        pcm.truncate(decoded);
        Ok(pcm)
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FrameEncoder;

    #[test]
    fn decode_rejects_garbage() {
        let mut decoder = FrameDecoder::new(16_000, 60).unwrap();
        let garbage = vec![0xFFu8; 8];
        assert!(matches!(
            decoder.decode(&garbage),
            Err(AudioError::Decoder(_))
        ));
    }

    #[test]
    fn decode_round_trips_encoded_frame() {
        let mut encoder = FrameEncoder::new(16_000, 60).unwrap();
        let pcm: Vec<u8> = vec![0u8; 960 * 2];
        let frames = encoder.encode_pcm(&pcm).unwrap();
        assert_eq!(frames.len(), 1);

        let mut decoder = FrameDecoder::new(16_000, 60).unwrap();
        let decoded = decoder.decode(&frames[0].data).unwrap();
        assert_eq!(decoded.len(), 960);
    }
}
