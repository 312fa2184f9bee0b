pub mod config;
pub mod constants;
pub mod energy;
pub mod error;
pub mod silero;

pub use config::{EnergyConfig, SileroConfig, VadConfig, VadMode};
pub use constants::{SAMPLE_RATE_HZ, WINDOW_SIZE_BYTES, WINDOW_SIZE_SAMPLES};
pub use energy::EnergyVad;
pub use error::VadError;
pub use silero::SileroVad;

/// Window-level voice classifier.
///
/// Implementations take one fixed-size PCM16 window at a time and decide
/// whether it contains speech. The segmenter aggregates window verdicts
/// into per-frame voiced flags.
pub trait VadEngine: Send {
    fn is_voiced(&mut self, window: &[i16]) -> Result<bool, VadError>;
    fn reset(&mut self);
}

/// Construct the engine selected by `config.mode`.
pub fn build_engine(config: &VadConfig) -> Result<Box<dyn VadEngine>, VadError> {
    match config.mode {
        VadMode::Energy => Ok(Box::new(EnergyVad::new(config.clone()))),
        VadMode::Silero => Ok(Box::new(SileroVad::new(config)?)),
    }
}
