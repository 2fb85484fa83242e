use thiserror::Error;

/// Errors returned by ONNX model operations.
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("model load: {0}")]
    Load(String),

    #[error("inference: {0}")]
    Inference(String),

    #[error("empty input")]
    EmptyInput,

    #[error("input size mismatch: shape {shape:?} needs {need} floats, got {got}")]
    InputSize {
        shape: Vec<i64>,
        need: usize,
        got: usize,
    },
}
