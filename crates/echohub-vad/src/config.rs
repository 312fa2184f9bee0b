use serde::{Deserialize, Serialize};

use super::constants::{SAMPLE_RATE_HZ, WINDOW_SIZE_SAMPLES};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VadMode {
    Energy, // dBFS threshold, no model dependency
    Silero, // ML-based, default
}

impl Default for VadMode {
    fn default() -> Self {
        Self::Silero
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Windows louder than this (dBFS) count as voiced.
    pub threshold_db: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self { threshold_db: -40.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SileroConfig {
    pub threshold: f32,
}

impl Default for SileroConfig {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    pub mode: VadMode,
    pub energy: EnergyConfig,
    pub silero: SileroConfig,
    pub window_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            mode: VadMode::default(),
            energy: EnergyConfig::default(),
            silero: SileroConfig::default(),
            window_size_samples: WINDOW_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

impl VadConfig {
    pub fn window_duration_ms(&self) -> f32 {
        (self.window_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }
}
