//! Core types shared across the pipelines.
//!
//! This module provides error handling, tensor aliases, the inference engine
//! boundary, and the batch splitting/joining contracts.

pub mod engine;
pub mod errors;
pub mod schema;
pub mod tensor;

pub use engine::{EngineInput, InferenceEngine};
pub use errors::{PipelineError, PipelineResult, ProcessingStage};
pub use schema::{Joinable, Splittable};
pub use tensor::{softmax, Tensor2D, Tensor3D, Tensor4D, TensorD};
