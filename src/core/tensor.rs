//! Tensor aliases and numeric helpers shared by the pipelines.
//!
//! The pipelines exchange `f32` tensors with the external inference engine.
//! This module provides the common type aliases and a numerically stable
//! softmax used by the classification scorer.

use ndarray::{Array, ArrayD, Axis, Dimension};

/// A 2-dimensional tensor represented as a 2D array of f32 values.
pub type Tensor2D = ndarray::Array2<f32>;

/// A 3-dimensional tensor represented as a 3D array of f32 values.
pub type Tensor3D = ndarray::Array3<f32>;

/// A 4-dimensional tensor represented as a 4D array of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// A dynamic-dimensional tensor of f32 values, as returned by the engine.
pub type TensorD = ArrayD<f32>;

/// Computes the softmax of a tensor along the given axis.
///
/// The maximum value of each lane is subtracted before exponentiation for
/// numeric stability, so very large logits do not overflow to infinity.
/// A lane whose exponentials sum to zero is left unnormalized rather than
/// dividing by zero.
///
/// # Arguments
///
/// * `logits` - The tensor of raw logits. Consumed and reused as the output
///   buffer.
/// * `axis` - The axis to normalize over.
///
/// # Returns
///
/// A tensor of the same shape where each lane along `axis` holds
/// probabilities.
pub fn softmax<D>(mut logits: Array<f32, D>, axis: Axis) -> Array<f32, D>
where
    D: Dimension,
{
    for mut lane in logits.lanes_mut(axis) {
        let max = lane.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        if sum > 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
    logits
}
