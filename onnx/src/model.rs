//! Single-tensor model wrapper over an ONNX Runtime session.

use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};

use crate::OnnxError;

/// Holds a loaded ONNX model with one logical float input and output.
///
/// The engine's feature models (speaker, gender/age, emotion, anti-spoof,
/// DNSMOS, language) all share this contract: a flat float buffer plus shape
/// goes in through the first input, and the first output comes back as a
/// flat float vector. Stateful models (the VAD) drive their sessions
/// directly instead of using this wrapper.
pub struct Model {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
    output_shapes: Vec<Vec<i64>>,
}

impl Model {
    /// Loads a model from a file path.
    ///
    /// Paths may contain non-ASCII characters; `ort` handles platform
    /// encoding internally.
    pub fn load<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self, OnnxError> {
        let path = path.as_ref();
        let session = Session::builder()
            .map_err(|e| OnnxError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| OnnxError::Load(e.to_string()))?
            .with_intra_threads(threads.max(1))
            .map_err(|e| OnnxError::Load(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| OnnxError::Load(format!("{}: {e}", path.display())))?;

        let input_names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        let output_shapes: Vec<Vec<i64>> = session
            .outputs()
            .iter()
            .map(|o| match o.dtype() {
                ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
                _ => Vec::new(),
            })
            .collect();

        tracing::info!(
            path = %path.display(),
            inputs = ?input_names,
            outputs = ?output_names,
            "model loaded"
        );

        Ok(Self {
            session,
            input_names,
            output_names,
            output_shapes,
        })
    }

    /// Runs the first input through the model and returns the first output
    /// as a flat float vector.
    pub fn run(&mut self, input: &[f32], shape: &[i64]) -> Result<Vec<f32>, OnnxError> {
        if input.is_empty() {
            return Err(OnnxError::EmptyInput);
        }
        if self.input_names.is_empty() || self.output_names.is_empty() {
            return Err(OnnxError::Inference("model has no inputs or outputs".into()));
        }
        let need = element_count(shape);
        if input.len() < need {
            return Err(OnnxError::InputSize {
                shape: shape.to_vec(),
                need,
                got: input.len(),
            });
        }

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(1) as usize).collect();
        let tensor = Tensor::from_array((dims, input[..need].to_vec()))
            .map_err(|e| OnnxError::Inference(e.to_string()))?;

        let input_name = self.input_names[0].clone();
        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => tensor])
            .map_err(|e| OnnxError::Inference(e.to_string()))?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxError::Inference(e.to_string()))?;
        Ok(data.to_vec())
    }

    /// Input tensor names, in model order.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Output tensor names, in model order.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Static shape of the given output, as reported by the model.
    /// Dynamic dimensions appear as non-positive values.
    pub fn output_shape(&self, index: usize) -> Option<&[i64]> {
        self.output_shapes.get(index).map(|s| s.as_slice())
    }

    /// Embedding-style output dimension: the last positive dimension of the
    /// first output, or `None` when the model does not report one.
    pub fn output_dim(&self) -> Option<usize> {
        let shape = self.output_shapes.first()?;
        shape
            .iter()
            .rev()
            .find(|&&d| d > 0)
            .map(|&d| d as usize)
    }
}

/// Number of elements implied by a shape, treating dynamic (non-positive)
/// dimensions as 1.
pub fn element_count(shape: &[i64]) -> usize {
    shape.iter().map(|&d| d.max(1) as usize).product()
}
