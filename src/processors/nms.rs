//! Non-maximum suppression for detection candidates.
//!
//! Given per-image candidate lists, this processor filters by confidence
//! threshold, then greedily selects the highest-confidence boxes while
//! suppressing others whose overlap exceeds the IoU threshold. Suppression
//! runs per class or globally, chosen once at construction.

use crate::core::errors::{PipelineError, PipelineResult};
use crate::processors::geometry::Rect;
use ndarray::{ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single proposed object instance for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Bounding box in corner format, image-pixel coordinates.
    pub rect: Rect,
    /// Confidence in [0, 1], objectness times class probability.
    pub confidence: f32,
    /// Index of the predicted class.
    pub class_id: usize,
}

/// Confidence and IoU thresholds, immutable per invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum confidence for a candidate to be considered.
    pub conf_thres: f32,
    /// IoU above which a lower-confidence candidate is suppressed.
    pub iou_thres: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            conf_thres: 0.45,
            iou_thres: 0.25,
        }
    }
}

impl Thresholds {
    /// Creates thresholds from the given values.
    pub fn new(conf_thres: f32, iou_thres: f32) -> Self {
        Self {
            conf_thres,
            iou_thres,
        }
    }

    /// Validates that both thresholds lie in [0, 1].
    ///
    /// # Returns
    ///
    /// Ok(()) if the thresholds are valid, a configuration error otherwise.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=1.0).contains(&self.conf_thres) || !self.conf_thres.is_finite() {
            return Err(PipelineError::config_error_with_context(
                "conf_thres",
                &self.conf_thres.to_string(),
                "must be a finite value in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_thres) || !self.iou_thres.is_finite() {
            return Err(PipelineError::config_error_with_context(
                "iou_thres",
                &self.iou_thres.to_string(),
                "must be a finite value in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Whether suppression compares candidates within the same class only, or
/// across all classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    /// Only candidates sharing a class id suppress each other.
    #[default]
    PerClass,
    /// Any overlapping candidate suppresses a lower-confidence one.
    Global,
}

/// The non-maximum suppression engine.
///
/// Holds no mutable state; thresholds are passed per call so concurrent
/// invocations across images are safe.
#[derive(Debug, Clone, Default)]
pub struct NonMaxSuppression {
    scope: SuppressionScope,
}

impl NonMaxSuppression {
    /// Creates a suppression engine with the given scope.
    pub fn new(scope: SuppressionScope) -> Self {
        Self { scope }
    }

    /// Creates a suppression engine with per-class scope.
    pub fn per_class() -> Self {
        Self::new(SuppressionScope::PerClass)
    }

    /// Creates a suppression engine with global scope.
    pub fn global() -> Self {
        Self::new(SuppressionScope::Global)
    }

    /// Returns the configured suppression scope.
    pub fn scope(&self) -> SuppressionScope {
        self.scope
    }

    /// Extracts confidence-filtered candidates from one image's decoded rows.
    ///
    /// Two row layouts are accepted:
    ///
    /// * width 6: `[x1, y1, x2, y2, confidence, class_id]` with the class
    ///   already selected;
    /// * width 5+C: `[cx, cy, w, h, objectness, class_0 .. class_{C-1}]`,
    ///   where the max-score class is selected per row and confidence is
    ///   objectness times that class score, re-filtered against
    ///   `conf_thres`.
    ///
    /// Rows narrower than 6 violate the engine contract.
    ///
    /// # Arguments
    ///
    /// * `rows` - The (num_candidates, row_width) array for one image.
    /// * `thresholds` - The confidence and IoU thresholds for this call.
    ///
    /// # Returns
    ///
    /// The candidates whose confidence is at least `conf_thres`.
    pub fn candidates(
        &self,
        rows: ArrayView2<f32>,
        thresholds: &Thresholds,
    ) -> PipelineResult<Vec<Detection>> {
        let width = rows.ncols();
        if width < 6 {
            return Err(PipelineError::unexpected_output_shape(
                "(num_candidates, >= 6)",
                format!("({}, {})", rows.nrows(), width),
            ));
        }

        let mut out = Vec::new();
        for row in rows.rows() {
            if width == 6 {
                let confidence = row[4];
                if confidence < thresholds.conf_thres || !confidence.is_finite() {
                    continue;
                }
                let class = row[5];
                if !class.is_finite() || class < 0.0 {
                    continue;
                }
                out.push(Detection {
                    rect: Rect::new(row[0], row[1], row[2], row[3]),
                    confidence,
                    class_id: class.round() as usize,
                });
            } else {
                let objectness = row[4];
                if objectness < thresholds.conf_thres || !objectness.is_finite() {
                    continue;
                }
                let mut class_id = 0usize;
                let mut class_score = f32::NEG_INFINITY;
                for (idx, &score) in row.iter().skip(5).enumerate() {
                    if score > class_score {
                        class_score = score;
                        class_id = idx;
                    }
                }
                let confidence = objectness * class_score;
                if confidence < thresholds.conf_thres || !confidence.is_finite() {
                    continue;
                }
                out.push(Detection {
                    rect: Rect::from_center_size(row[0], row[1], row[2], row[3]),
                    confidence,
                    class_id,
                });
            }
        }
        Ok(out)
    }

    /// Runs greedy suppression over one image's candidates.
    ///
    /// Candidates below `conf_thres` are dropped, the remainder is stably
    /// sorted by confidence descending (ties keep their original order), and
    /// a candidate is accepted only when its IoU against every previously
    /// accepted candidate does not exceed `iou_thres` (strict comparison:
    /// exactly-touching IoU is not suppressed). Under per-class scope only
    /// candidates sharing a class id compete.
    ///
    /// # Arguments
    ///
    /// * `candidates` - The decoded candidates for one image.
    /// * `thresholds` - The confidence and IoU thresholds for this call.
    ///
    /// # Returns
    ///
    /// The surviving detections in confidence-descending order. An empty
    /// candidate set yields an empty result, not an error.
    pub fn suppress(
        &self,
        mut candidates: Vec<Detection>,
        thresholds: &Thresholds,
    ) -> Vec<Detection> {
        let before = candidates.len();
        candidates.retain(|d| d.confidence >= thresholds.conf_thres);
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<Detection> = Vec::new();
        'candidates: for candidate in candidates {
            for accepted in &kept {
                if self.scope == SuppressionScope::PerClass
                    && accepted.class_id != candidate.class_id
                {
                    continue;
                }
                if accepted.rect.iou(&candidate.rect) > thresholds.iou_thres {
                    continue 'candidates;
                }
            }
            kept.push(candidate);
        }

        debug!(
            candidates = before,
            kept = kept.len(),
            conf_thres = thresholds.conf_thres,
            iou_thres = thresholds.iou_thres,
            "non-maximum suppression"
        );
        kept
    }

    /// Applies confidence filtering and suppression to a whole batch.
    ///
    /// # Arguments
    ///
    /// * `batch` - The (batch, num_candidates, row_width) decoded output.
    /// * `thresholds` - The confidence and IoU thresholds for this call.
    ///
    /// # Returns
    ///
    /// Per-image surviving detections in confidence-descending order.
    pub fn apply(
        &self,
        batch: ArrayView3<f32>,
        thresholds: &Thresholds,
    ) -> PipelineResult<Vec<Vec<Detection>>> {
        thresholds.validate()?;
        batch
            .outer_iter()
            .map(|image| {
                let candidates = self.candidates(image, thresholds)?;
                Ok(self.suppress(candidates, thresholds))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn det(coords: [f32; 4], confidence: f32, class_id: usize) -> Detection {
        Detection {
            rect: Rect::new(coords[0], coords[1], coords[2], coords[3]),
            confidence,
            class_id,
        }
    }

    #[test]
    fn test_suppress_overlapping_lower_confidence() {
        // Second candidate overlaps the first with IoU 0.81 and is
        // suppressed; the third is far away and survives.
        let candidates = vec![
            det([0.0, 0.0, 10.0, 10.0], 0.9, 0),
            det([1.0, 1.0, 10.0, 10.0], 0.8, 0),
            det([50.0, 50.0, 60.0, 60.0], 0.7, 0),
        ];
        let nms = NonMaxSuppression::per_class();
        let kept = nms.suppress(candidates, &Thresholds::new(0.5, 0.5));

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn test_confidence_threshold_is_inclusive() {
        let candidates = vec![
            det([0.0, 0.0, 10.0, 10.0], 0.5, 0),
            det([20.0, 20.0, 30.0, 30.0], 0.4999, 0),
        ];
        let nms = NonMaxSuppression::per_class();
        let kept = nms.suppress(candidates, &Thresholds::new(0.5, 0.5));

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.5);
    }

    #[test]
    fn test_iou_equal_to_threshold_is_not_suppressed() {
        // Side-by-side boxes sharing half their area: IoU = 50/150 = 1/3.
        let candidates = vec![
            det([0.0, 0.0, 10.0, 10.0], 0.9, 0),
            det([5.0, 0.0, 15.0, 10.0], 0.8, 0),
        ];
        let nms = NonMaxSuppression::per_class();
        let kept = nms.suppress(candidates, &Thresholds::new(0.1, 1.0 / 3.0));

        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_per_class_scope_keeps_other_classes() {
        let candidates = vec![
            det([0.0, 0.0, 10.0, 10.0], 0.9, 0),
            det([0.0, 0.0, 10.0, 10.0], 0.8, 1),
        ];
        let per_class = NonMaxSuppression::per_class();
        let kept = per_class.suppress(candidates.clone(), &Thresholds::new(0.1, 0.5));
        assert_eq!(kept.len(), 2);

        let global = NonMaxSuppression::global();
        let kept = global.suppress(candidates, &Thresholds::new(0.1, 0.5));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 0);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let candidates = vec![
            det([0.0, 0.0, 10.0, 10.0], 0.8, 0),
            det([100.0, 100.0, 110.0, 110.0], 0.8, 0),
        ];
        let nms = NonMaxSuppression::per_class();
        let kept = nms.suppress(candidates, &Thresholds::new(0.1, 0.5));

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].rect.x1, 0.0);
        assert_eq!(kept[1].rect.x1, 100.0);
    }

    #[test]
    fn test_empty_after_threshold_is_not_an_error() {
        let candidates = vec![det([0.0, 0.0, 10.0, 10.0], 0.1, 0)];
        let nms = NonMaxSuppression::per_class();
        let kept = nms.suppress(candidates, &Thresholds::new(0.9, 0.5));
        assert!(kept.is_empty());
    }

    #[test]
    fn test_candidates_multi_class_rows() {
        // One row: center box (5,5) size 10x10, objectness 0.9, two class
        // scores with class 1 winning.
        let mut batch = Array3::<f32>::zeros((1, 1, 7));
        batch
            .slice_mut(ndarray::s![0, 0, ..])
            .assign(&ndarray::arr1(&[5.0, 5.0, 10.0, 10.0, 0.9, 0.2, 0.8]));

        let nms = NonMaxSuppression::per_class();
        let candidates = nms
            .candidates(batch.index_axis(ndarray::Axis(0), 0), &Thresholds::new(0.5, 0.5))
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
        assert!((candidates[0].confidence - 0.72).abs() < 1e-6);
        assert_eq!(candidates[0].rect, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_candidates_reduced_confidence_is_refiltered() {
        // Objectness passes the threshold alone but objectness * class
        // score falls below it.
        let mut batch = Array3::<f32>::zeros((1, 1, 7));
        batch
            .slice_mut(ndarray::s![0, 0, ..])
            .assign(&ndarray::arr1(&[5.0, 5.0, 10.0, 10.0, 0.6, 0.5, 0.4]));

        let nms = NonMaxSuppression::per_class();
        let candidates = nms
            .candidates(batch.index_axis(ndarray::Axis(0), 0), &Thresholds::new(0.5, 0.5))
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_candidates_narrow_rows_are_a_contract_violation() {
        let batch = Array3::<f32>::zeros((1, 4, 5));
        let nms = NonMaxSuppression::per_class();
        let err = nms
            .candidates(batch.index_axis(ndarray::Axis(0), 0), &Thresholds::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedOutputShape { .. }));
    }

    #[test]
    fn test_apply_batch_output_sorted_descending() {
        let mut batch = Array3::<f32>::zeros((1, 3, 6));
        batch
            .slice_mut(ndarray::s![0, 0, ..])
            .assign(&ndarray::arr1(&[0.0, 0.0, 10.0, 10.0, 0.6, 0.0]));
        batch
            .slice_mut(ndarray::s![0, 1, ..])
            .assign(&ndarray::arr1(&[30.0, 30.0, 40.0, 40.0, 0.9, 1.0]));
        batch
            .slice_mut(ndarray::s![0, 2, ..])
            .assign(&ndarray::arr1(&[60.0, 60.0, 70.0, 70.0, 0.7, 2.0]));

        let nms = NonMaxSuppression::per_class();
        let results = nms.apply(batch.view(), &Thresholds::new(0.5, 0.5)).unwrap();

        assert_eq!(results.len(), 1);
        let confidences: Vec<f32> = results[0].iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.6]);
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(Thresholds::new(0.5, 0.5).validate().is_ok());
        assert!(Thresholds::new(1.5, 0.5).validate().is_err());
        assert!(Thresholds::new(0.5, -0.1).validate().is_err());
        assert!(Thresholds::new(f32::NAN, 0.5).validate().is_err());
    }
}
