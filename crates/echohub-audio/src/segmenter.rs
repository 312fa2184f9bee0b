use echohub_vad::{VadEngine, WINDOW_SIZE_SAMPLES};

use crate::error::AudioError;

/// One PCM frame flowing toward the recognizer. `is_last` marks the
/// trailing silent frame that closes an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFrame {
    pub pcm: Vec<i16>,
    pub is_last: bool,
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// A frame is voiced when strictly more of its windows than this are
    /// classified as speech.
    pub voiced_window_threshold: usize,
    /// Consecutive voiced frames required before a segment is emitted.
    pub min_voiced_frames: usize,
    pub window_size_samples: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            voiced_window_threshold: 3,
            min_voiced_frames: 3,
            window_size_samples: WINDOW_SIZE_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Idle,
    Accumulating,
    Emitting,
}

/// Carves contiguous voiced runs out of the decoded frame stream.
///
/// Short voiced bursts below `min_voiced_frames` are treated as false
/// starts and discarded; once a segment is open every voiced frame is
/// forwarded immediately, and the first silent frame after voice is
/// forwarded with `is_last` so the recognizer knows the utterance ended.
pub struct Segmenter {
    vad: Box<dyn VadEngine>,
    config: SegmenterConfig,
    state: SegmentState,
    pending: Vec<Vec<i16>>,
}

impl Segmenter {
    pub fn new(vad: Box<dyn VadEngine>, config: SegmenterConfig) -> Self {
        Self {
            vad,
            config,
            state: SegmentState::Idle,
            pending: Vec::new(),
        }
    }

    /// Feed one decoded PCM frame; returns the frames released downstream.
    pub fn push(&mut self, pcm: Vec<i16>) -> Result<Vec<SegmentFrame>, AudioError> {
        let voiced = self.classify(&pcm)?;

        let mut released = Vec::new();
        match self.state {
            SegmentState::Idle => {
                if voiced {
                    self.pending.push(pcm);
                    if self.pending.len() >= self.config.min_voiced_frames {
                        self.flush_pending(&mut released);
                        self.state = SegmentState::Emitting;
                    } else {
                        self.state = SegmentState::Accumulating;
                    }
                }
            }
            SegmentState::Accumulating => {
                if voiced {
                    self.pending.push(pcm);
                    if self.pending.len() >= self.config.min_voiced_frames {
                        self.flush_pending(&mut released);
                        self.state = SegmentState::Emitting;
                    }
                } else {
                    // False start, too short to be speech.
                    tracing::trace!(frames = self.pending.len(), "discarding voiced prefix");
                    self.pending.clear();
                    self.state = SegmentState::Idle;
                }
            }
            SegmentState::Emitting => {
                if voiced {
                    released.push(SegmentFrame {
                        pcm,
                        is_last: false,
                    });
                } else {
                    released.push(SegmentFrame { pcm, is_last: true });
                    self.state = SegmentState::Idle;
                }
            }
        }

        Ok(released)
    }

    /// Drop any buffered prefix and return to idle. Used when listening
    /// stops mid-utterance.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state = SegmentState::Idle;
        self.vad.reset();
    }

    pub fn is_idle(&self) -> bool {
        self.state == SegmentState::Idle
    }

    fn flush_pending(&mut self, released: &mut Vec<SegmentFrame>) {
        for pcm in self.pending.drain(..) {
            released.push(SegmentFrame {
                pcm,
                is_last: false,
            });
        }
    }

    fn classify(&mut self, pcm: &[i16]) -> Result<bool, AudioError> {
        let mut voiced_windows = 0usize;
        for window in pcm.chunks_exact(self.config.window_size_samples) {
            if self.vad.is_voiced(window)? {
                voiced_windows += 1;
            }
        }
        Ok(voiced_windows > self.config.voiced_window_threshold)
    }
}
