use thiserror::Error;

use echohub_vad::VadError;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Decoder error: {0}")]
    Decoder(opus::Error),

    #[error("Encoder error: {0}")]
    Encoder(opus::Error),

    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error(transparent)]
    Vad(#[from] VadError),
}
