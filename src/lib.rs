//! # Infera
//!
//! Inference-pipeline adapters for two tasks on top of an external
//! compiled-inference engine: zero-shot text classification with MNLI-style
//! entailment models, and YOLO-style object detection.
//!
//! Each adapter converts user-facing structured input into tensors the
//! engine consumes, and converts raw engine output tensors back into
//! structured, human-interpretable results. The engine itself, the
//! tokenizer, and the model graph loader are opaque collaborators behind
//! the [`core::InferenceEngine`] trait.
//!
//! ## Modules
//!
//! * [`core`] - error handling, tensor aliases, the engine boundary, and
//!   batch split/join contracts
//! * [`processors`] - geometry, pre-NMS decoding, non-maximum suppression,
//!   and entailment scoring
//! * [`pipeline`] - the detection and zero-shot pipeline adapters

pub mod core;
pub mod pipeline;
pub mod processors;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error handling
    pub use crate::core::{PipelineError, PipelineResult};

    // Engine boundary
    pub use crate::core::{EngineInput, InferenceEngine, TensorD};

    // Batch contracts
    pub use crate::core::{Joinable, Splittable};

    // Detection
    pub use crate::pipeline::{DetectionConfig, ImageDetections, YoloPipeline};
    pub use crate::processors::{Detection, Rect, SuppressionScope, Thresholds};

    // Zero-shot classification
    pub use crate::pipeline::{
        LabelSet, ZeroShotConfig, ZeroShotInput, ZeroShotOutput, ZeroShotPipeline,
    };
}
