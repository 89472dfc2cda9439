//! Entailment scoring for zero-shot classification.
//!
//! MNLI-style models emit one logit row per (sequence, label) pair. After
//! the pipeline reshapes those rows to (num_sequences, num_labels,
//! num_model_outputs), this processor turns them into per-label scores under
//! two normalization modes and ranks labels by descending score.

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::tensor::{softmax, Tensor2D, Tensor3D};
use ndarray::{ArrayView3, Axis};

/// Scores (sequence, label) entailment logits.
///
/// Stateless apart from the two output indices resolved at construction.
#[derive(Debug, Clone, Copy)]
pub struct EntailmentScorer {
    entailment_index: usize,
    contradiction_index: usize,
}

impl EntailmentScorer {
    /// Creates a scorer from the model's output indices.
    ///
    /// # Arguments
    ///
    /// * `entailment_index` - Index of the entailment logit in the model
    ///   output.
    /// * `contradiction_index` - Index of the contradiction logit in the
    ///   model output.
    ///
    /// # Returns
    ///
    /// A new scorer, or a configuration error if the indices coincide.
    pub fn new(entailment_index: usize, contradiction_index: usize) -> PipelineResult<Self> {
        if entailment_index == contradiction_index {
            return Err(PipelineError::config_error(format!(
                "entailment_index and contradiction_index must differ, both are {}",
                entailment_index
            )));
        }
        Ok(Self {
            entailment_index,
            contradiction_index,
        })
    }

    /// Returns the entailment output index.
    pub fn entailment_index(&self) -> usize {
        self.entailment_index
    }

    /// Returns the contradiction output index.
    pub fn contradiction_index(&self) -> usize {
        self.contradiction_index
    }

    /// Computes per-label scores for each sequence.
    ///
    /// With `multi_class` false, the entailment logits are normalized with a
    /// softmax across the label axis, so each sequence's scores sum to one.
    /// With `multi_class` true, each label's [entailment, contradiction]
    /// pair is normalized independently and the entailment probability is
    /// kept; scores then need not sum to one.
    ///
    /// # Arguments
    ///
    /// * `logits` - The (num_sequences, num_labels, num_model_outputs)
    ///   logits tensor.
    /// * `multi_class` - Whether label probabilities are independent.
    ///
    /// # Returns
    ///
    /// A (num_sequences, num_labels) score tensor.
    pub fn score(&self, logits: ArrayView3<f32>, multi_class: bool) -> PipelineResult<Tensor2D> {
        let (num_sequences, num_labels, num_outputs) = logits.dim();
        if self.entailment_index >= num_outputs
            || (multi_class && self.contradiction_index >= num_outputs)
        {
            return Err(PipelineError::unexpected_output_shape(
                format!(
                    "model output width > {}",
                    self.entailment_index.max(self.contradiction_index)
                ),
                format!("({num_sequences}, {num_labels}, {num_outputs})"),
            ));
        }

        if !multi_class {
            let entailment = logits
                .index_axis(Axis(2), self.entailment_index)
                .to_owned();
            Ok(softmax(entailment, Axis(1)))
        } else {
            let mut pairs = Tensor3D::zeros((num_sequences, num_labels, 2));
            pairs
                .index_axis_mut(Axis(2), 0)
                .assign(&logits.index_axis(Axis(2), self.entailment_index));
            pairs
                .index_axis_mut(Axis(2), 1)
                .assign(&logits.index_axis(Axis(2), self.contradiction_index));
            let probabilities = softmax(pairs, Axis(2));
            Ok(probabilities.index_axis(Axis(2), 0).to_owned())
        }
    }

    /// Ranks labels for one sequence by descending score.
    ///
    /// The sort is stable on negated score, so tied labels keep their
    /// original order.
    ///
    /// # Arguments
    ///
    /// * `scores` - One sequence's per-label scores.
    ///
    /// # Returns
    ///
    /// Label indices sorted by descending score.
    pub fn rank(&self, scores: &[f32]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn scorer() -> EntailmentScorer {
        EntailmentScorer::new(0, 2).unwrap()
    }

    #[test]
    fn test_coinciding_indices_are_rejected() {
        assert!(EntailmentScorer::new(1, 1).is_err());
    }

    #[test]
    fn test_single_class_scores_sum_to_one() {
        let mut logits = Array3::<f32>::zeros((2, 3, 3));
        logits.slice_mut(ndarray::s![0, .., 0]).assign(&ndarray::arr1(&[1.0, 2.0, 0.5]));
        logits.slice_mut(ndarray::s![1, .., 0]).assign(&ndarray::arr1(&[0.0, -1.0, 3.0]));

        let scores = scorer().score(logits.view(), false).unwrap();
        for row in scores.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        // The largest entailment logit wins.
        assert_eq!(scorer().rank(scores.row(0).as_slice().unwrap())[0], 1);
        assert_eq!(scorer().rank(scores.row(1).as_slice().unwrap())[0], 2);
    }

    #[test]
    fn test_multi_class_scores_are_independent() {
        let mut logits = Array3::<f32>::zeros((1, 2, 3));
        // Label 0: entailment 3.0 vs contradiction -3.0, near-certain.
        // Label 1: entailment 2.0 vs contradiction -2.0, also high.
        logits.slice_mut(ndarray::s![0, 0, ..]).assign(&ndarray::arr1(&[3.0, 0.0, -3.0]));
        logits.slice_mut(ndarray::s![0, 1, ..]).assign(&ndarray::arr1(&[2.0, 0.0, -2.0]));

        let scores = scorer().score(logits.view(), true).unwrap();
        for &s in scores.iter() {
            assert!((0.0..=1.0).contains(&s));
        }
        assert!(scores[[0, 0]] > 0.9);
        assert!(scores[[0, 1]] > 0.9);
        // Both labels score high at once; no sum constraint.
        assert!(scores.row(0).sum() > 1.0);
    }

    #[test]
    fn test_out_of_range_index_is_a_contract_violation() {
        let logits = Array3::<f32>::zeros((1, 2, 2));
        let err = scorer().score(logits.view(), true).unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedOutputShape { .. }));
    }

    #[test]
    fn test_entailment_index_checked_without_multi_class() {
        let scorer = EntailmentScorer::new(3, 1).unwrap();
        let logits = Array3::<f32>::zeros((1, 2, 3));
        assert!(scorer.score(logits.view(), false).is_err());
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let order = scorer().rank(&[0.4, 0.4, 0.2]);
        assert_eq!(order, vec![0, 1, 2]);
    }
}
