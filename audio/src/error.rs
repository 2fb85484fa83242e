use thiserror::Error;

/// Errors returned by audio conditioning operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cannot open file: {0}")]
    FileNotFound(String),

    #[error("wav format: {0}")]
    WavFormat(String),

    #[error("invalid audio: {0}")]
    Invalid(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
