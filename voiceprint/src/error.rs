//! Engine error taxonomy and the per-thread detail slot.
//!
//! Each failing public operation stores a human-readable detail string in a
//! thread-local slot, readable until the next call on the same thread. The
//! C-callable layer forwards [`VoiceprintError::code`] as its status integer
//! and [`last_error`] as the detail.

use std::cell::RefCell;

use thiserror::Error;
use voxid_audio::AudioError;
use voxid_onnx::OnnxError;

/// Errors returned by speaker-recognition operations.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("not initialized")]
    NotInit,

    #[error("already initialized")]
    AlreadyInit,

    #[error("model load: {0}")]
    ModelLoad(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("audio too short: {got_sec:.2}s of speech (minimum {min_sec:.1}s)")]
    AudioTooShort { got_sec: f32, min_sec: f32 },

    #[error("invalid audio: {0}")]
    AudioInvalid(String),

    #[error("speaker already exists: {0}")]
    SpeakerExists(String),

    #[error("speaker not found: {0}")]
    SpeakerNotFound(String),

    #[error("database: {0}")]
    Db(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("output buffer too small: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },

    #[error("no matching speaker (best: {best_id:?} at {best_score:.4})")]
    NoMatch { best_id: String, best_score: f32 },

    #[error("wav format: {0}")]
    WavFormat(String),

    #[error("inference: {0}")]
    Inference(String),

    #[error("diarization failed: {0}")]
    DiarizeFailed(String),

    #[error("unknown: {0}")]
    Unknown(String),
}

impl VoiceprintError {
    /// Stable integer code for the C-callable surface.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unknown(_) => -1,
            Self::InvalidParam(_) => -2,
            Self::NotInit => -3,
            Self::AlreadyInit => -4,
            Self::ModelLoad(_) | Self::ModelNotAvailable(_) => -5,
            Self::AudioTooShort { .. } => -6,
            Self::AudioInvalid(_) => -7,
            Self::SpeakerExists(_) => -8,
            Self::SpeakerNotFound(_) => -9,
            Self::Db(_) => -10,
            Self::FileNotFound(_) => -11,
            Self::BufferTooSmall { .. } => -12,
            Self::NoMatch { .. } => -13,
            Self::WavFormat(_) => -14,
            Self::Inference(_) | Self::DiarizeFailed(_) => -15,
        }
    }
}

impl From<AudioError> for VoiceprintError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::FileNotFound(p) => Self::FileNotFound(p),
            AudioError::WavFormat(m) => Self::WavFormat(m),
            AudioError::Invalid(m) => Self::AudioInvalid(m),
            AudioError::Io(e) => Self::Unknown(e.to_string()),
        }
    }
}

impl From<OnnxError> for VoiceprintError {
    fn from(e: OnnxError) -> Self {
        match e {
            OnnxError::Load(m) => Self::ModelLoad(m),
            other => Self::Inference(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for VoiceprintError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(e.to_string())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Stores the detail string for the current thread.
pub fn set_last_error(msg: impl std::fmt::Display) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = msg.to_string());
}

/// Returns the detail string of the most recent failure on this thread.
pub fn last_error() -> String {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Records the error (if any) into the thread-local slot and passes the
/// result through.
pub(crate) fn record<T>(result: Result<T, VoiceprintError>) -> Result<T, VoiceprintError> {
    if let Err(e) = &result {
        set_last_error(e);
    }
    result
}
