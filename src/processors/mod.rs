//! Post-processing components for the pipelines.
//!
//! * [`geometry`] - box format conversion and IoU computation
//! * [`decode`] - pre-NMS decoding of raw per-anchor detection output
//! * [`nms`] - confidence filtering and non-maximum suppression
//! * [`zero_shot`] - entailment scoring for zero-shot classification

pub mod decode;
pub mod geometry;
pub mod nms;
pub mod zero_shot;

pub use decode::PreNmsDecoder;
pub use geometry::Rect;
pub use nms::{Detection, NonMaxSuppression, SuppressionScope, Thresholds};
pub use zero_shot::EntailmentScorer;
