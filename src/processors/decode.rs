//! Pre-NMS decoding of raw detection output.
//!
//! Networks whose graph does not embed a decoding layer emit one row per
//! anchor of `[cx, cy, w, h, objectness, class_0 .. class_{C-1}]`. This
//! processor converts those rows into per-image candidate lists: the box is
//! converted from center-size to corner format, the max-score class is
//! selected, and confidence is objectness times that class score. The values
//! are already probability-like; no activation is applied here.

use crate::core::errors::{PipelineError, PipelineResult};
use crate::processors::geometry::Rect;
use crate::processors::nms::Detection;
use ndarray::{ArrayView2, ArrayView3};

/// Decoder for raw per-anchor network output.
///
/// Stateless; only used when the model graph lacks built-in post-processing.
/// Whether that is the case is decided once, externally, by inspecting the
/// model graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreNmsDecoder;

impl PreNmsDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes one image's raw rows into candidates.
    ///
    /// # Arguments
    ///
    /// * `rows` - The (num_anchors, 5 + num_classes) array for one image.
    ///
    /// # Returns
    ///
    /// One candidate per anchor. Confidence thresholding is left to the
    /// suppression stage.
    pub fn decode_image(&self, rows: ArrayView2<f32>) -> PipelineResult<Vec<Detection>> {
        let width = rows.ncols();
        if width < 6 {
            return Err(PipelineError::unexpected_output_shape(
                "(num_anchors, 5 + num_classes) with num_classes >= 1",
                format!("({}, {})", rows.nrows(), width),
            ));
        }

        let mut candidates = Vec::with_capacity(rows.nrows());
        for row in rows.rows() {
            let objectness = row[4];
            let mut class_id = 0usize;
            let mut class_score = f32::NEG_INFINITY;
            for (idx, &score) in row.iter().skip(5).enumerate() {
                if score > class_score {
                    class_score = score;
                    class_id = idx;
                }
            }
            candidates.push(Detection {
                rect: Rect::from_center_size(row[0], row[1], row[2], row[3]),
                confidence: objectness * class_score,
                class_id,
            });
        }
        Ok(candidates)
    }

    /// Decodes a whole batch of raw output.
    ///
    /// # Arguments
    ///
    /// * `raw` - The (batch, num_anchors, 5 + num_classes) output tensor.
    ///
    /// # Returns
    ///
    /// Per-image candidate lists, one entry per anchor.
    pub fn decode_batch(&self, raw: ArrayView3<f32>) -> PipelineResult<Vec<Vec<Detection>>> {
        raw.outer_iter()
            .map(|image| self.decode_image(image))
            .collect()
    }
}
