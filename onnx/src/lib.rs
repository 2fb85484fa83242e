//! Thin wrapper around ONNX Runtime for the voxid engine.
//!
//! [`Model`] covers the single-input/single-output contract shared by every
//! feature model. The runtime environment is process-wide and managed by
//! `ort`; sessions are independently owned and safe to run concurrently.

mod error;
mod model;

pub use error::OnnxError;
pub use model::{element_count, Model};
