//! Batch splitting and joining contracts for pipeline input schemas.
//!
//! Some engines are compiled for a fixed batch size, so an input schema
//! representing a batch of size N must be splittable into N batch-size-1
//! inputs and joinable back. These contracts are explicit traits with
//! exactly two operations rather than duck-typed conventions.

use crate::core::errors::PipelineResult;

/// A contract that ensures an input schema representing a batch of size N
/// can be split into smaller inputs each representing a batch of size 1.
pub trait Splittable: Sized {
    /// Splits this input into batch-size-1 inputs.
    ///
    /// # Returns
    ///
    /// A vector of smaller inputs, each representing a batch of size 1, or
    /// an error if this input cannot be split.
    fn split(self) -> PipelineResult<Vec<Self>>;
}

/// A contract that ensures multiple inputs of the implementing schema can be
/// combined into one input representing a bigger batch.
pub trait Joinable: Sized {
    /// Joins batch-size-1 inputs back into one batched input.
    ///
    /// # Arguments
    ///
    /// * `parts` - The inputs to combine, in their original order.
    ///
    /// # Returns
    ///
    /// One input representing the whole batch, or an error if the parts are
    /// inconsistent with each other.
    fn join(parts: Vec<Self>) -> PipelineResult<Self>;
}
