use thiserror::Error;
use voxid_onnx::OnnxError;

/// Errors returned by voice-analysis operations.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("not initialized")]
    NotInit,

    #[error("model not available: {0}")]
    ModelNotAvailable(&'static str),

    #[error("inference: {0}")]
    Inference(String),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),
}

impl AnalyzeError {
    /// Stable integer code for the C-callable surface.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParam(_) => -2,
            Self::NotInit => -3,
            Self::ModelNotAvailable(_) => -5,
            Self::Inference(_) => -15,
            Self::AnalysisFailed(_) => -16,
        }
    }
}

impl From<OnnxError> for AnalyzeError {
    fn from(e: OnnxError) -> Self {
        match e {
            OnnxError::Load(m) => Self::AnalysisFailed(m),
            other => Self::Inference(other.to_string()),
        }
    }
}

/// Mirrors the error into the engine's per-thread detail slot.
pub(crate) fn record<T>(result: Result<T, AnalyzeError>) -> Result<T, AnalyzeError> {
    if let Err(e) = &result {
        voxid_voiceprint::set_last_error(e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AnalyzeError::NotInit.code(), -3);
        assert_eq!(AnalyzeError::ModelNotAvailable("emotion").code(), -5);
        assert_eq!(AnalyzeError::Inference("x".into()).code(), -15);
    }
}
