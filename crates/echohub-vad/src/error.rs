use thiserror::Error;

#[derive(Debug, Error)]
pub enum VadError {
    #[error("Invalid window size: expected {expected}, got {actual}")]
    InvalidWindowSize { expected: usize, actual: usize },

    #[error("Model initialization failed: {0}")]
    ModelInitFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}
