//! Pipeline adapters wrapping the external inference engine.
//!
//! * [`detection`] - YOLO-style object detection
//! * [`zero_shot`] - zero-shot text classification with MNLI-style models
//! * [`classes`] - built-in class-name tables

pub mod classes;
pub mod detection;
pub mod zero_shot;

pub use classes::{class_name_map, coco_class_names, COCO_CLASSES};
pub use detection::{DetectionConfig, ImageDetections, YoloPipeline};
pub use zero_shot::{
    LabelSet, ScoringContext, ZeroShotConfig, ZeroShotInput, ZeroShotOutput, ZeroShotPipeline,
    DEFAULT_HYPOTHESIS_TEMPLATE,
};
