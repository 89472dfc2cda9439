//! The inference engine boundary.
//!
//! The compiled inference engine is an opaque collaborator: it receives
//! pre-shaped numeric tensors and returns numeric tensors. Model loading,
//! graph compilation, and tokenization all live behind this trait.

use crate::core::errors::PipelineResult;
use crate::core::tensor::TensorD;
use ndarray::ArrayD;

/// A single input tensor handed to the inference engine.
///
/// Quantized models consume raw `u8` image data; everything else consumes
/// `f32`. Quantized engine outputs are dequantized by the engine side before
/// this crate's post-processing runs.
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// Standard floating-point input.
    Float(ArrayD<f32>),
    /// Raw quantized input, passed through without scaling.
    Uint8(ArrayD<u8>),
}

impl EngineInput {
    /// Returns the shape of the underlying tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            EngineInput::Float(t) => t.shape(),
            EngineInput::Uint8(t) => t.shape(),
        }
    }
}

/// Trait for the external compiled-inference engine.
///
/// Implementations are expected to be safely callable from multiple threads;
/// the pipelines hold no mutable state across calls.
pub trait InferenceEngine: Send + Sync {
    /// Runs one forward pass.
    ///
    /// # Arguments
    ///
    /// * `inputs` - The engine input tensors, already shaped for the model.
    ///
    /// # Returns
    ///
    /// The raw output tensors, or an error if the engine fails.
    fn run(&self, inputs: Vec<EngineInput>) -> PipelineResult<Vec<TensorD>>;
}
