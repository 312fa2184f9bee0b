use opus::{Application, Channels, Encoder};

use crate::error::AudioError;

/// One compressed frame of synthesized speech, tagged for ordered
/// streaming toward the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub is_start: bool,
    pub is_end: bool,
}

const SUPPORTED_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Re-encodes a synthesized PCM16 buffer into fixed-duration opus frames.
pub struct FrameEncoder {
    encoder: Encoder,
    samples_per_frame: usize,
}

impl FrameEncoder {
    pub fn new(sample_rate: u32, frame_duration_ms: u32) -> Result<Self, AudioError> {
        if !SUPPORTED_RATES.contains(&sample_rate) {
            return Err(AudioError::UnsupportedSampleRate(sample_rate));
        }

        let encoder = Encoder::new(sample_rate, Channels::Mono, Application::Voip)
            .map_err(AudioError::Encoder)?;
        let samples_per_frame = (sample_rate as usize * frame_duration_ms as usize) / 1000;

        Ok(Self {
            encoder,
            samples_per_frame,
        })
    }

    /// Slice a little-endian PCM16 buffer into full frames, zero-padding
    /// the tail, and encode each. Frames the encoder answers with zero
    /// bytes for are dropped. The first surviving frame carries
    /// `is_start`, the final one `is_end`.
    pub fn encode_pcm(&mut self, pcm: &[u8]) -> Result<Vec<EncodedFrame>, AudioError> {
        // PCM16 needs an even byte count; a trailing odd byte is noise.
        let pcm = if pcm.len() % 2 != 0 {
            &pcm[..pcm.len() - 1]
        } else {
            pcm
        };

        let mut samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let remainder = samples.len() % self.samples_per_frame;
        if remainder != 0 {
            samples.resize(samples.len() + self.samples_per_frame - remainder, 0);
        }

        let mut frames = Vec::with_capacity(samples.len() / self.samples_per_frame);
        let mut out = vec![0u8; self.samples_per_frame * 2];
        for frame_pcm in samples.chunks_exact(self.samples_per_frame) {
            let written = self
                .encoder
                .encode(frame_pcm, &mut out)
                .map_err(AudioError::Encoder)?;
            if written == 0 {
                continue;
            }
            frames.push(EncodedFrame {
                data: out[..written].to_vec(),
                is_start: false,
                is_end: false,
            });
        }

        if let Some(first) = frames.first_mut() {
            first.is_start = true;
        }
        if let Some(last) = frames.last_mut() {
            last.is_end = true;
        }

        Ok(frames)
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }
}
