use crate::config::VadConfig;
use crate::error::VadError;
use crate::VadEngine;

/// Fixed-threshold energy VAD, the model-free fallback engine. A window
/// counts as voiced when its RMS level clears `energy.threshold_db`.
pub struct EnergyVad {
    config: VadConfig,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// RMS level of one PCM16 window relative to full scale, in dBFS.
    /// Digital silence maps to -100 dBFS.
    fn window_dbfs(window: &[i16]) -> f32 {
        let sum_squares = window
            .iter()
            .fold(0.0f64, |acc, &sample| {
                let s = f64::from(sample);
                acc + s * s
            });
        let rms = (sum_squares / window.len() as f64).sqrt() / f64::from(i16::MAX);
        if rms <= f64::EPSILON {
            return -100.0;
        }
        (20.0 * rms.log10()) as f32
    }
}

impl VadEngine for EnergyVad {
    fn is_voiced(&mut self, window: &[i16]) -> Result<bool, VadError> {
        if window.len() != self.config.window_size_samples {
            return Err(VadError::InvalidWindowSize {
                expected: self.config.window_size_samples,
                actual: window.len(),
            });
        }

        Ok(Self::window_dbfs(window) > self.config.energy.threshold_db)
    }

    fn reset(&mut self) {}
}
