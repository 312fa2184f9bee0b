use voice_activity_detector::VoiceActivityDetector;

use crate::config::VadConfig;
use crate::error::VadError;
use crate::VadEngine;

/// Silero-based window classifier. Default engine.
pub struct SileroVad {
    detector: VoiceActivityDetector,
    threshold: f32,
    window_size_samples: usize,
}

impl SileroVad {
    pub fn new(config: &VadConfig) -> Result<Self, VadError> {
        let detector = VoiceActivityDetector::builder()
            .sample_rate(config.sample_rate_hz as i64)
            .chunk_size(config.window_size_samples)
            .build()
            .map_err(|e| VadError::ModelInitFailed(e.to_string()))?;

        Ok(Self {
            detector,
            threshold: config.silero.threshold,
            window_size_samples: config.window_size_samples,
        })
    }
}

impl VadEngine for SileroVad {
    fn is_voiced(&mut self, window: &[i16]) -> Result<bool, VadError> {
        if window.len() != self.window_size_samples {
            return Err(VadError::InvalidWindowSize {
                expected: self.window_size_samples,
                actual: window.len(),
            });
        }

        let probability = self.detector.predict(window.iter().copied());
        Ok(probability > self.threshold)
    }

    fn reset(&mut self) {
        // The model carries inter-window state; rebuilding it between
        // utterances is not required, silero degrades gracefully.
    }
}
